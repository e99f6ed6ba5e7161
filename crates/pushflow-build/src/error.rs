use thiserror::Error;

/// ビルド＆プッシュ処理のエラー
///
/// Login results are shared between every caller waiting on the same
/// registry, so all payloads are owned and the enum is `Clone`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("No '{tool}' command available on PATH: Please install to use container 'build' mode.")]
    ToolNotInstalled { tool: String },

    #[error("{command} failed with exit code {code}\n{stdout}")]
    ExternalToolFailure {
        command: String,
        code: i32,
        stdout: String,
    },

    #[error("{0}")]
    MalformedInput(String),

    #[error("Internal error: {0}")]
    InternalInvariant(String),
}

impl BuildError {
    /// 失敗したコマンドの終了コード（外部ツールの失敗時のみ）
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BuildError::ExternalToolFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::ToolNotInstalled { tool } => {
                format!(
                    "{}\n\
                     \n\
                     解決方法:\n\
                     1. {} がインストールされているか確認してください\n\
                     2. PATH に含まれているか確認してください\n\
                     3. 別のツールを使う場合は --tool または PUSHFLOW_TOOL で指定してください",
                    self, tool
                )
            }
            BuildError::ExternalToolFailure { .. } => {
                format!(
                    "{}\n\
                     \n\
                     上記はビルドツールの出力です。コマンドの内容を確認してください。",
                    self
                )
            }
            BuildError::MalformedInput(msg) => {
                format!(
                    "入力が不正です: {}\n\
                     \n\
                     pushflow.yaml の設定を確認してください。",
                    msg
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
