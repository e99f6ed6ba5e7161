//! ビルド＆プッシュの全体制御
//!
//! `Start → [Login?] → [ResolveCache?] → BuildStages* → BuildFinal →
//! {DryRun: Done | Push: PushFinal → PushStages* → Done}`
//!
//! Any failure aborts the remaining steps. Only a missing cache image is
//! recovered from.

use crate::builder::ImageBuilder;
use crate::cache::CacheResolver;
use crate::command::CommandPolicy;
use crate::error::{BuildError, Result};
use crate::log::{LogSink, Severity, TracingSink};
use crate::login::LoginCoordinator;
use crate::pusher::ImagePusher;
use crate::reference::{check_repository_url, image_name_and_tag, tagged_image_name};
use crate::request::PublishRequest;
use crate::runner::{ProcessRunner, ToolRunner};
use std::sync::Arc;

pub const DEFAULT_TOOL: &str = "docker";

/// ビルドしてレジストリにプッシュする
pub struct ImagePublisher {
    runner: Arc<dyn ToolRunner>,
    sink: Arc<dyn LogSink>,
    logins: Arc<LoginCoordinator>,
    tool: String,
    dry_run: bool,
}

#[derive(Default)]
pub struct ImagePublisherBuilder {
    runner: Option<Arc<dyn ToolRunner>>,
    sink: Option<Arc<dyn LogSink>>,
    logins: Option<Arc<LoginCoordinator>>,
    tool: Option<String>,
    dry_run: bool,
}

impl ImagePublisherBuilder {
    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 既存のログインテーブルを共有する
    pub fn logins(mut self, logins: Arc<LoginCoordinator>) -> Self {
        self.logins = Some(logins);
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> ImagePublisher {
        ImagePublisher {
            runner: self.runner.unwrap_or_else(|| Arc::new(ProcessRunner)),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            logins: self.logins.unwrap_or_default(),
            tool: self.tool.unwrap_or_else(|| DEFAULT_TOOL.to_string()),
            dry_run: self.dry_run,
        }
    }
}

impl ImagePublisher {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::builder().sink(sink).build()
    }

    pub fn builder() -> ImagePublisherBuilder {
        ImagePublisherBuilder::default()
    }

    pub fn logins(&self) -> &Arc<LoginCoordinator> {
        &self.logins
    }

    /// イメージをビルドし、（dry-run でなければ）プッシュする
    ///
    /// Returns the content-addressed `repo:[tag-]id` name. It is the same
    /// whether or not the push actually happened.
    pub async fn publish(&self, request: PublishRequest) -> Result<String> {
        let PublishRequest {
            image_name,
            source,
            repository_url,
            registry,
            skip_push,
        } = request;

        if image_name.trim().is_empty() {
            return Err(BuildError::MalformedInput(
                "Cannot build a container without an image name".to_string(),
            ));
        }
        let spec = source.normalize()?;
        if let Some(url) = &repository_url {
            check_repository_url(url)?;
        }
        let (base_name, user_tag) = image_name_and_tag(&image_name);

        let policy = CommandPolicy::new(self.runner.clone(), self.sink.clone(), self.tool.as_str());
        let push_enabled = !self.dry_run && !skip_push;
        let pull_from_cache = spec.wants_cache() && repository_url.is_some();

        // 認証エラーはビルド前に検出する
        if let Some(registry) = &registry
            && (push_enabled || pull_from_cache)
        {
            self.sink.report_progress("Logging in to registry...", None);
            self.logins.login(&policy, registry).await?;
        }

        let cache_from = if pull_from_cache {
            CacheResolver::new(policy.clone())
                .resolve_cache(&image_name, spec.cache_stages(), repository_url.as_deref())
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let output = ImageBuilder::new(policy.clone())
            .build_image(&image_name, &spec, &cache_from)
            .await?;
        self.sink
            .report_result("Image build succeeded.", Severity::Info, None);

        let unique_name = tagged_image_name(
            repository_url.as_deref().unwrap_or(base_name),
            user_tag,
            Some(output.image_id.as_str()),
        );

        if push_enabled {
            match repository_url.as_deref() {
                Some(repository_url) => {
                    ImagePusher::new(policy)
                        .push_build(&image_name, repository_url, user_tag, &output)
                        .await?;
                    self.sink.report_result(
                        &format!("Pushed {}", unique_name),
                        Severity::Info,
                        None,
                    );
                }
                None => {
                    self.sink.report_result(
                        "No repository URL configured; skipping push",
                        Severity::Warning,
                        None,
                    );
                }
            }
        }

        Ok(unique_name)
    }
}
