//! External command execution
//!
//! Spawns the build tool and reports its output through a [`LogSink`]. The
//! runner never fails: launch errors and non-zero exits are both folded into
//! [`CommandResult::code`].

use crate::log::{LogSink, Severity, StreamId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Outcome of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub code: i32,
    pub stdout: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// 実行するコマンドの内容
#[derive(Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub stdin: Option<String>,
    /// `false` hides everything after the subcommand (credential-bearing calls).
    pub report_full_command_line: bool,
    /// Report stderr of a failed command as a warning instead of an error.
    pub report_error_as_warning: bool,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            report_full_command_line: true,
            ..Default::default()
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn redacted(mut self) -> Self {
        self.report_full_command_line = false;
        self
    }

    pub fn errors_as_warnings(mut self) -> Self {
        self.report_error_as_warning = true;
        self
    }

    /// ログ・エラーメッセージ用のコマンドライン表記
    ///
    /// Redacted invocations only show the program and its first argument;
    /// env entries are dropped as well.
    pub fn command_line(&self) -> String {
        let mut pieces: Vec<String> = Vec::new();
        if self.report_full_command_line {
            pieces.extend(self.env.iter().map(|(k, v)| format!("{}={}", k, v)));
            pieces.push(self.program.clone());
            pieces.extend(self.args.iter().cloned());
        } else {
            pieces.push(self.program.clone());
            pieces.extend(self.args.first().cloned());
        }
        format!("'{}'", pieces.join(" "))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command_line", &self.command_line())
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Seam between the engine and the operating system.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, sink: &dyn LogSink) -> CommandResult;
}

/// `tokio::process` による本番用の実装
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, sink: &dyn LogSink) -> CommandResult {
        let stream = StreamId::random();
        sink.report_progress(
            &format!("Executing {}", invocation.command_line()),
            Some(stream),
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.envs(&invocation.env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        tracing::debug!("Running: {}", invocation.command_line());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return finish(invocation, sink, stream, 1, Vec::new(), e.to_string());
            }
        };

        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let write_stdin = async {
            if let (Some(mut pipe), Some(input)) = (stdin_pipe, invocation.stdin.as_deref()) {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!("Failed to write stdin for {}: {}", invocation.program, e);
                }
                // pipe は drop で閉じる
            }
        };
        let read_stdout = stream_stdout(stdout_pipe, sink, stream);
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe
                && let Err(e) = pipe.read_to_end(&mut buf).await
            {
                tracing::debug!("Failed to read stderr of {}: {}", invocation.program, e);
            }
            buf
        };

        let ((), stdout, stderr) = tokio::join!(write_stdin, read_stdout, read_stderr);
        let mut stderr = String::from_utf8_lossy(&stderr).into_owned();

        let code = match child.wait().await {
            // シグナルで終了した場合は終了コードがない
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                stderr.push_str(&e.to_string());
                1
            }
        };

        finish(invocation, sink, stream, code, stdout, stderr)
    }
}

/// stdout をチャンク単位でそのまま進捗として流しつつ蓄積する
async fn stream_stdout<R>(pipe: Option<R>, sink: &dyn LogSink, stream: StreamId) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let Some(mut pipe) = pipe else {
        return out;
    };

    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                sink.report_progress(&String::from_utf8_lossy(&buf[..n]), Some(stream));
                out.extend_from_slice(&buf[..n]);
            }
            Err(e) => {
                tracing::debug!("stdout read error: {}", e);
                break;
            }
        }
    }
    out
}

fn finish(
    invocation: &Invocation,
    sink: &dyn LogSink,
    stream: StreamId,
    code: i32,
    stdout: Vec<u8>,
    stderr: String,
) -> CommandResult {
    // stderr には警告とエラーが混在するので、終了コードを見てから重要度を決める
    if !stderr.is_empty() {
        let severity = if code != 0 && !invocation.report_error_as_warning {
            Severity::Error
        } else {
            Severity::Warning
        };
        sink.report_result(&stderr, severity, Some(stream));
    }

    if code != 0 {
        sink.report_progress(&format!("{} failed.", invocation.program), Some(stream));
    }

    CommandResult {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
    }
}
