use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: pushflow.local.yaml, pushflow.yaml, .pushflow.yaml\n\
        - ./.pushflow/ ディレクトリ\n\
        - ~/.config/pushflow/pushflow.yaml\n\
        または PUSHFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("レジストリ {server} のパスワードがありません（password または password_env を指定してください）")]
    MissingPassword { server: String },

    #[error("環境変数 {name} が設定されていません（registry.password_env）")]
    PasswordEnvNotSet { name: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
