//! PushFlow の設定ファイル（pushflow.yaml）の検索と読み込み

pub mod error;

pub use error::*;

use pushflow_build::{BuildSource, PublishRequest, Registry};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_CANDIDATES: [&str; 3] = ["pushflow.local.yaml", "pushflow.yaml", ".pushflow.yaml"];

/// 環境変数で設定ファイルを直接指定する
pub const CONFIG_PATH_ENV: &str = "PUSHFLOW_CONFIG_PATH";

/// イメージ定義
///
/// ```yaml
/// image_name: app:v1
/// build:
///   context: ./app
///   cache_from:
///     stages: [deps, builder]
/// repository_url: registry.example.com/team/app
/// registry:
///   server: registry.example.com
///   username: ci
///   password_env: REGISTRY_PASSWORD
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDefinition {
    pub image_name: String,
    pub build: BuildSource,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub registry: Option<RegistryDefinition>,
    #[serde(default)]
    pub skip_push: bool,
    /// 使用するビルドツール（省略時は docker）
    #[serde(default)]
    pub tool: Option<String>,
}

/// レジストリ認証情報の定義（パスワードは直書きか環境変数）
#[derive(Clone, Deserialize)]
pub struct RegistryDefinition {
    pub server: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

impl std::fmt::Debug for RegistryDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryDefinition")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .finish()
    }
}

impl RegistryDefinition {
    /// パスワードを解決して [`Registry`] を作る
    ///
    /// `password_env` wins over an inline `password` when both are set.
    pub fn resolve(&self) -> Result<Registry> {
        let password = match (&self.password_env, &self.password) {
            (Some(name), _) => std::env::var(name)
                .map_err(|_| ConfigError::PasswordEnvNotSet { name: name.clone() })?,
            (None, Some(password)) => password.clone(),
            (None, None) => {
                return Err(ConfigError::MissingPassword {
                    server: self.server.clone(),
                });
            }
        };
        Ok(Registry::new(&self.server, &self.username, password))
    }
}

impl ImageDefinition {
    pub fn into_request(self) -> Result<PublishRequest> {
        let mut request = PublishRequest::new(self.image_name, self.build).skip_push(self.skip_push);
        if let Some(url) = self.repository_url {
            request = request.with_repository(url);
        }
        if let Some(registry) = &self.registry {
            request = request.with_registry(registry.resolve()?);
        }
        Ok(request)
    }

    /// 相対パスを設定ファイルのディレクトリ基準に直す
    fn resolve_paths(&mut self, base: &Path) {
        let join = |path: &Path| {
            if path.as_os_str().is_empty() || path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        };
        match &mut self.build {
            BuildSource::Context(path) => *path = join(path),
            BuildSource::Spec(spec) => {
                spec.context = Some(join(&spec.context_or_default()));
                if let Some(dockerfile) = &spec.dockerfile {
                    spec.dockerfile = Some(join(dockerfile));
                }
            }
        }
    }
}

/// PushFlow のグローバル設定ディレクトリ (~/.config/pushflow)
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pushflow"))
}

/// プロジェクトの pushflow.yaml を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 PUSHFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: pushflow.local.yaml, pushflow.yaml, .pushflow.yaml
/// 3. ./.pushflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/pushflow/pushflow.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::debug!("{} points to a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    let project_dir = current_dir.join(".pushflow");
    if project_dir.is_dir()
        && let Some(path) = find_in(&project_dir)
    {
        return Ok(path);
    }

    if let Some(global) = global_config_dir().map(|dir| dir.join("pushflow.yaml"))
        && global.exists()
    {
        return Ok(global);
    }

    Err(ConfigError::ConfigFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// イメージ定義を読み込む
///
/// Relative `context` and `dockerfile` paths are taken relative to the
/// directory of the file.
pub fn load_definition(path: &Path) -> Result<ImageDefinition> {
    let content = std::fs::read_to_string(path)?;
    let mut definition = parse_definition(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(base) = path.parent()
        && !base.as_os_str().is_empty()
    {
        definition.resolve_paths(base);
    }
    tracing::debug!("loaded image definition from {}", path.display());
    Ok(definition)
}

pub fn parse_definition(content: &str) -> std::result::Result<ImageDefinition, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushflow_build::CacheFrom;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str = "image_name: app\nbuild: ./app\n";

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("pushflow.yaml"), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("pushflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("pushflow.yaml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join(".pushflow.yaml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join("pushflow.local.yaml"), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        // pushflow.local.yaml が優先される
        assert!(result.unwrap().ends_with("pushflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let project_dir = temp_dir.path().join(".pushflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("pushflow.yaml"), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".pushflow/pushflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, MINIMAL).unwrap();

        let result = temp_env::with_var(CONFIG_PATH_ENV, Some(&config_path), find_config_file);
        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_find_config_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        // グローバル設定がある環境ではそちらが見つかる
        match result {
            Err(ConfigError::ConfigFileNotFound) => {}
            Ok(path) => assert!(path.ends_with("pushflow/pushflow.yaml")),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_parse_full_definition() {
        let yaml = r#"
image_name: app:v1
build:
  context: ./app
  dockerfile: ./app/Dockerfile
  build_args:
    VERSION: "1.2"
  cache_from:
    stages: [deps, builder]
repository_url: registry.example.com/team/app
registry:
  server: registry.example.com
  username: ci
  password: s3cret
skip_push: true
tool: podman
"#;
        let definition = parse_definition(yaml).unwrap();
        assert_eq!(definition.tool.as_deref(), Some("podman"));

        let request = definition.into_request().unwrap();
        assert_eq!(request.image_name, "app:v1");
        assert!(request.skip_push);
        assert_eq!(
            request.repository_url.as_deref(),
            Some("registry.example.com/team/app")
        );
        assert_eq!(
            request.registry,
            Some(Registry::new("registry.example.com", "ci", "s3cret"))
        );
        let spec = request.source.normalize().unwrap();
        assert_eq!(spec.cache_stages(), ["deps", "builder"]);
    }

    #[test]
    fn test_parse_context_only_definition() {
        let definition = parse_definition(MINIMAL).unwrap();
        assert_eq!(definition.build, BuildSource::Context(PathBuf::from("./app")));
        assert!(definition.registry.is_none());
        assert!(!definition.skip_push);
    }

    #[test]
    fn test_parse_cache_from_true() {
        let definition =
            parse_definition("image_name: app\nbuild:\n  context: .\n  cache_from: true\n").unwrap();
        let BuildSource::Spec(spec) = definition.build else {
            panic!("expected a build spec");
        };
        assert_eq!(spec.cache_from, Some(CacheFrom::Enabled(true)));
    }

    #[test]
    #[serial]
    fn test_password_from_env() {
        let yaml = "image_name: app\nbuild: .\nregistry:\n  server: ghcr.io\n  username: bob\n  password_env: TEST_PUSHFLOW_PASSWORD\n";

        let request = temp_env::with_var("TEST_PUSHFLOW_PASSWORD", Some("hunter2"), || {
            parse_definition(yaml).unwrap().into_request()
        })
        .unwrap();
        assert_eq!(request.registry.unwrap().password, "hunter2");

        let err = temp_env::with_var_unset("TEST_PUSHFLOW_PASSWORD", || {
            parse_definition(yaml).unwrap().into_request()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::PasswordEnvNotSet { .. }));
    }

    #[test]
    fn test_missing_password() {
        let yaml = "image_name: app\nbuild: .\nregistry:\n  server: ghcr.io\n  username: bob\n";
        let err = parse_definition(yaml).unwrap().into_request().unwrap_err();
        assert!(matches!(err, ConfigError::MissingPassword { .. }));
    }

    #[test]
    fn test_load_resolves_paths_relative_to_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pushflow.yaml");
        fs::write(
            &path,
            "image_name: app\nbuild:\n  context: app\n  dockerfile: app/Dockerfile\n",
        )
        .unwrap();

        let definition = load_definition(&path).unwrap();
        let BuildSource::Spec(spec) = definition.build else {
            panic!("expected a build spec");
        };
        assert_eq!(spec.context, Some(temp_dir.path().join("app")));
        assert_eq!(spec.dockerfile, Some(temp_dir.path().join("app/Dockerfile")));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pushflow.yaml");
        fs::write(&path, "build: [unterminated").unwrap();

        let err = load_definition(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("pushflow.yaml"));
    }

    #[test]
    fn test_debug_hides_password() {
        let definition = RegistryDefinition {
            server: "ghcr.io".to_string(),
            username: "bob".to_string(),
            password: Some("hunter2".to_string()),
            password_env: None,
        };
        assert!(!format!("{:?}", definition).contains("hunter2"));
    }
}
