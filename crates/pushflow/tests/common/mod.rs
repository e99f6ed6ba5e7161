use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_config(&self, content: &str) {
        let path = self.root.path().join("pushflow.yaml");
        fs::write(path, content).unwrap();
    }

    /// Installs a shell script standing in for docker. Every invocation is
    /// appended to `calls.log`; `image inspect` answers with a fixed digest.
    #[cfg(unix)]
    pub fn write_fake_tool(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let log = self.calls_log();
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{}"
case "$1" in
  version) echo '{{"Client":{{"Version":"24.0.7"}}}}' ;;
  image) echo "sha256:feedbeef" ;;
esac
exit 0
"#,
            log.display()
        );
        let path = self.root.path().join("fake-docker");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn calls_log(&self) -> PathBuf {
        self.root.path().join("calls.log")
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.calls_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}
