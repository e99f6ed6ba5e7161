//! レジストリログインの重複排除
//!
//! `docker login` against the same (server, username) pair is done once per
//! coordinator. Later callers, concurrent or not, await the outcome of that
//! first attempt.

use crate::command::CommandPolicy;
use crate::error::{BuildError, Result};
use crate::request::Registry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use semver::Version;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// `--password-stdin` が使える最初のクライアントバージョン
pub const PASSWORD_STDIN_MIN_VERSION: Version = Version::new(17, 7, 0);

type PendingLogin = Shared<BoxFuture<'static, Result<()>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoginKey {
    server: String,
    username: String,
}

impl From<&Registry> for LoginKey {
    fn from(registry: &Registry) -> Self {
        Self {
            server: registry.server.clone(),
            username: registry.username.clone(),
        }
    }
}

/// パスワードの渡し方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// `login --password-stdin`
    Stdin,
    /// `login -p <password>`
    Flag,
}

/// Owns the login table. Share one instance (`Arc`) across publishes to get
/// process-wide deduplication.
#[derive(Default)]
pub struct LoginCoordinator {
    logins: Mutex<HashMap<LoginKey, PendingLogin>>,
    mode: Arc<OnceCell<CredentialMode>>,
}

impl LoginCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// レジストリにログイン（同じキーでは1回だけ実行）
    pub async fn login(&self, policy: &CommandPolicy, registry: &Registry) -> Result<()> {
        let pending = {
            // lookup と insert の間に await を挟まないこと
            let mut logins = self.logins.lock().unwrap_or_else(|e| e.into_inner());
            logins
                .entry(LoginKey::from(registry))
                .or_insert_with(|| {
                    tracing::debug!(
                        "Starting login to {} as {}",
                        registry.server,
                        registry.username
                    );
                    let policy = policy.clone();
                    let registry = registry.clone();
                    let mode = self.mode.clone();
                    async move { perform_login(&policy, &mode, &registry).await }
                        .boxed()
                        .shared()
                })
                .clone()
        };
        pending.await
    }

    /// ログイン済み（または実行中）のエントリ数
    pub fn len(&self) -> usize {
        self.logins.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn perform_login(
    policy: &CommandPolicy,
    mode: &OnceCell<CredentialMode>,
    registry: &Registry,
) -> Result<()> {
    let mode = *mode
        .get_or_try_init(|| probe_credential_mode(policy))
        .await?;

    // 失敗時にユーザー名・パスワードが出ないよう、コマンドラインは伏せる
    match mode {
        CredentialMode::Stdin => {
            policy
                .run_must_succeed(
                    &[
                        "login",
                        "-u",
                        registry.username.as_str(),
                        "--password-stdin",
                        registry.server.as_str(),
                    ],
                    false,
                    Some(registry.password.as_str()),
                    None,
                )
                .await?;
        }
        CredentialMode::Flag => {
            policy
                .run_must_succeed(
                    &[
                        "login",
                        "-u",
                        registry.username.as_str(),
                        "-p",
                        registry.password.as_str(),
                        registry.server.as_str(),
                    ],
                    false,
                    None,
                    None,
                )
                .await?;
        }
    }
    Ok(())
}

/// `version -f {{json .}}` の出力
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionInfo {
    client: ClientVersion,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ClientVersion {
    version: String,
}

/// クライアントバージョンからパスワードの渡し方を決める
pub async fn probe_credential_mode(policy: &CommandPolicy) -> Result<CredentialMode> {
    let output = policy
        .run_must_succeed(&["version", "-f", "{{json .}}"], true, None, None)
        .await
        .map_err(|_| BuildError::ToolNotInstalled {
            tool: policy.tool().to_string(),
        })?;
    tracing::debug!("'{} version' => {}", policy.tool(), output.trim());

    let version = serde_json::from_str::<VersionInfo>(output.trim())
        .ok()
        .and_then(|info| parse_client_version(&info.client.version));

    match version {
        Some(version) if version >= PASSWORD_STDIN_MIN_VERSION => Ok(CredentialMode::Stdin),
        Some(_) => Ok(CredentialMode::Flag),
        None => {
            policy.sink().report_progress(
                &format!("Could not process {} version ({})", policy.tool(), output.trim()),
                None,
            );
            Ok(CredentialMode::Flag)
        }
    }
}

/// `17.07.0-ce` のような表記も受け付ける緩いパース
pub fn parse_client_version(raw: &str) -> Option<Version> {
    let core = raw
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()?;

    let mut parts = core.split('.').map(|p| p.parse::<u64>());
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
