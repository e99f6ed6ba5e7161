//! Build / publish request types

use crate::error::{BuildError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// ビルド設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// ビルドコンテキスト（省略時はカレントディレクトリ）
    #[serde(default)]
    pub context: Option<PathBuf>,
    #[serde(default)]
    pub dockerfile: Option<PathBuf>,
    /// 宣言順のまま `--build-arg` に渡す
    #[serde(default, alias = "args")]
    pub build_args: IndexMap<String, String>,
    #[serde(default)]
    pub cache_from: Option<CacheFrom>,
    /// `docker build` にそのまま渡す追加オプション
    #[serde(default)]
    pub extra_options: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl BuildSpec {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: Some(context.into()),
            ..Default::default()
        }
    }

    pub fn context_or_default(&self) -> PathBuf {
        self.context.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn with_cache_from(mut self, cache_from: CacheFrom) -> Self {
        self.cache_from = Some(cache_from);
        self
    }

    /// cache-from が要求されているか（`false` は無効扱い）
    pub fn wants_cache(&self) -> bool {
        !matches!(self.cache_from, None | Some(CacheFrom::Enabled(false)))
    }

    /// キャッシュ対象の名前付きステージ（宣言順）
    pub fn cache_stages(&self) -> &[String] {
        match &self.cache_from {
            Some(CacheFrom::Stages(spec)) => &spec.stages,
            _ => &[],
        }
    }
}

/// `cache_from: true` もしくは `cache_from: { stages: [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheFrom {
    Enabled(bool),
    Stages(CacheSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    #[serde(default)]
    pub stages: Vec<String>,
}

impl CacheSpec {
    pub fn stages<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: stages.into_iter().map(Into::into).collect(),
        }
    }
}

/// コンテキストパスのみの指定か、完全なビルド設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSource {
    Context(PathBuf),
    Spec(BuildSpec),
}

impl BuildSource {
    pub fn normalize(self) -> Result<BuildSpec> {
        match self {
            BuildSource::Context(path) if path.as_os_str().is_empty() => Err(
                BuildError::MalformedInput(
                    "Cannot build a container with an empty build specification".to_string(),
                ),
            ),
            BuildSource::Context(path) => Ok(BuildSpec::new(path)),
            BuildSource::Spec(spec) => {
                for stage in spec.cache_stages() {
                    validate_stage_name(stage)?;
                }
                Ok(spec)
            }
        }
    }
}

/// ステージ名はそのままタグになるので、タグとして有効な名前のみ許可
///
/// `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
fn validate_stage_name(stage: &str) -> Result<()> {
    let valid = stage
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && stage.len() <= 128
        && stage
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(BuildError::MalformedInput(format!(
            "Invalid cache stage name '{}': stage names must be valid image tags",
            stage
        )));
    }
    Ok(())
}

impl From<BuildSpec> for BuildSource {
    fn from(spec: BuildSpec) -> Self {
        BuildSource::Spec(spec)
    }
}

/// レジストリの認証情報
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub server: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Registry {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 1回のビルド＆プッシュ要求
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// ローカルのイメージ名。タグ部分（`app:v1` の `v1`）がユーザータグになる
    pub image_name: String,
    pub source: BuildSource,
    pub repository_url: Option<String>,
    pub registry: Option<Registry>,
    pub skip_push: bool,
}

impl PublishRequest {
    pub fn new(image_name: impl Into<String>, source: impl Into<BuildSource>) -> Self {
        Self {
            image_name: image_name.into(),
            source: source.into(),
            repository_url: None,
            registry: None,
            skip_push: false,
        }
    }

    pub fn with_repository(mut self, repository_url: impl Into<String>) -> Self {
        self.repository_url = Some(repository_url.into());
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn skip_push(mut self, skip: bool) -> Self {
        self.skip_push = skip;
        self
    }
}

/// ビルド結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// ダイジェストの16進部分（`sha256:` を除いたもの）
    pub image_id: String,
    pub stages: Vec<String>,
}
