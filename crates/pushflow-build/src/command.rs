//! Must-succeed / can-fail policies on top of a [`ToolRunner`].

use crate::error::{BuildError, Result};
use crate::log::LogSink;
use crate::runner::{CommandResult, Invocation, ToolRunner};
use std::collections::BTreeMap;
use std::sync::Arc;

/// ビルドツールの呼び出し口
#[derive(Clone)]
pub struct CommandPolicy {
    runner: Arc<dyn ToolRunner>,
    sink: Arc<dyn LogSink>,
    tool: String,
}

impl CommandPolicy {
    pub fn new(runner: Arc<dyn ToolRunner>, sink: Arc<dyn LogSink>, tool: impl Into<String>) -> Self {
        Self {
            runner,
            sink,
            tool: tool.into(),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    pub fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new(self.tool.as_str(), args.iter().copied())
    }

    /// Runs the tool and turns a non-zero exit into [`BuildError::ExternalToolFailure`].
    ///
    /// With `report_full_command_line = false` only the subcommand shows up in
    /// progress output and in the error.
    pub async fn run_must_succeed(
        &self,
        args: &[&str],
        report_full_command_line: bool,
        stdin: Option<&str>,
        env: Option<&BTreeMap<String, String>>,
    ) -> Result<String> {
        let mut invocation = self.invocation(args);
        invocation.report_full_command_line = report_full_command_line;
        if let Some(stdin) = stdin {
            invocation = invocation.with_stdin(stdin);
        }
        if let Some(env) = env {
            invocation = invocation.with_env(env.clone());
        }
        self.must_succeed(invocation).await
    }

    pub async fn must_succeed(&self, invocation: Invocation) -> Result<String> {
        let result = self.runner.run(&invocation, self.sink()).await;
        if result.code != 0 {
            return Err(BuildError::ExternalToolFailure {
                command: invocation.command_line(),
                code: result.code,
                stdout: result.stdout,
            });
        }
        Ok(result.stdout)
    }

    /// 失敗を許容する呼び出し（キャッシュの pull など）
    pub async fn run_can_fail(&self, args: &[&str], report_error_as_warning: bool) -> CommandResult {
        let mut invocation = self.invocation(args);
        invocation.report_error_as_warning = report_error_as_warning;
        self.runner.run(&invocation, self.sink()).await
    }
}
