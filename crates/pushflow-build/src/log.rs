//! ログ出力先の抽象化
//!
//! Build output is reported through two channels: ephemeral progress that a
//! UI may overwrite or collapse, and durable results that stay visible.

use rand::Rng;
use std::fmt;

/// 永続メッセージの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 1回のコマンド実行に属するメッセージをまとめる相関ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u32);

impl StreamId {
    /// `0..2^30` の範囲でランダムに生成
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..(1u32 << 30)))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiver for everything the engine wants the user to see.
pub trait LogSink: Send + Sync {
    /// Transient progress; may be superseded by the next message.
    fn report_progress(&self, text: &str, stream: Option<StreamId>);

    /// A message that must survive until the end of the run.
    fn report_result(&self, text: &str, severity: Severity, stream: Option<StreamId>);
}

/// `tracing` に流すだけのデフォルト実装
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn report_progress(&self, text: &str, stream: Option<StreamId>) {
        let stream = stream.map(|s| s.value());
        tracing::debug!(?stream, "{}", text.trim_end());
    }

    fn report_result(&self, text: &str, severity: Severity, stream: Option<StreamId>) {
        let stream = stream.map(|s| s.value());
        match severity {
            Severity::Info => tracing::info!(?stream, "{}", text.trim_end()),
            Severity::Warning => tracing::warn!(?stream, "{}", text.trim_end()),
            Severity::Error => tracing::error!(?stream, "{}", text.trim_end()),
        }
    }
}
