//! Test doubles shared by the unit tests in this crate.

use crate::log::{LogSink, Severity, StreamId};
use crate::runner::{CommandResult, Invocation, ToolRunner};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct RecordingSink {
    progress: Mutex<Vec<String>>,
    results: Mutex<Vec<(String, Severity)>>,
}

impl RecordingSink {
    pub fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<(String, Severity)> {
        self.results.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn report_progress(&self, text: &str, _stream: Option<StreamId>) {
        self.progress.lock().unwrap().push(text.to_string());
    }

    fn report_result(&self, text: &str, severity: Severity, _stream: Option<StreamId>) {
        self.results.lock().unwrap().push((text.to_string(), severity));
    }
}

type Responder = Box<dyn Fn(&Invocation) -> CommandResult + Send + Sync>;

/// Records every invocation and answers from a scripted responder.
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    responder: Responder,
    delay: Option<Duration>,
}

impl FakeRunner {
    pub fn new(responder: impl Fn(&Invocation) -> CommandResult + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: None,
        }
    }

    /// A fake docker that succeeds on everything and reports a fixed digest.
    pub fn docker() -> Self {
        Self::new(docker_ok)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// `args` of each call joined by spaces, for order assertions.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.args.join(" ")).collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation, _sink: &dyn LogSink) -> CommandResult {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(invocation)
    }
}

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        code: 0,
        stdout: stdout.to_string(),
    }
}

pub fn failed(code: i32, stdout: &str) -> CommandResult {
    CommandResult {
        code,
        stdout: stdout.to_string(),
    }
}

pub const DIGEST: &str = "sha256:0123abcd";

pub fn docker_ok(invocation: &Invocation) -> CommandResult {
    match invocation.args.first().map(String::as_str) {
        Some("version") => ok(r#"{"Client":{"Version":"24.0.7"}}"#),
        Some("image") => ok(&format!("{}\n", DIGEST)),
        _ => ok(""),
    }
}
