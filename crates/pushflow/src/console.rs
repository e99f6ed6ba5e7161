//! ターミナル向けの LogSink
//!
//! Progress lines drive a spinner on stderr. Results are printed above it
//! with a colored severity prefix. stdout is left for the image reference.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pushflow_build::{LogSink, Severity, StreamId};
use std::time::Duration;

pub struct ConsoleSink {
    progress_bar: ProgressBar,
}

impl ConsoleSink {
    pub fn new(image_name: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Building {}...", image_name));
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl LogSink for ConsoleSink {
    fn report_progress(&self, text: &str, _stream: Option<StreamId>) {
        // ビルド出力は複数行で届くので最後の行だけ表示
        if let Some(line) = last_line(text) {
            self.progress_bar.set_message(line.to_string());
        }
    }

    fn report_result(&self, text: &str, severity: Severity, _stream: Option<StreamId>) {
        let prefix = match severity {
            Severity::Info => "✓".green(),
            Severity::Warning => "⚠".yellow(),
            Severity::Error => "✗".red().bold(),
        };
        self.progress_bar
            .suspend(|| eprintln!("{} {}", prefix, text.trim_end()));
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}
