//! キャッシュ元イメージの解決
//!
//! Pulls the previous image of every cached stage (and of the final image)
//! so the next build can seed its layer cache from them. A missing image is
//! the normal case on a first build and only produces a warning from the
//! tool's stderr.

use crate::command::CommandPolicy;
use crate::reference::tagged_image_name;

pub struct CacheResolver {
    policy: CommandPolicy,
}

impl CacheResolver {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// `--cache-from` に渡すイメージ一覧を返す
    ///
    /// Returns `None` without a repository URL, since there is nothing to
    /// pull from. Pulls run one at a time in stage order, final image last.
    pub async fn resolve_cache(
        &self,
        image_name: &str,
        stages: &[String],
        repository_url: Option<&str>,
    ) -> Option<Vec<String>> {
        let repository_url = repository_url?;
        tracing::debug!("pulling cache for {} from {}", image_name, repository_url);

        let mut cache_from = Vec::new();
        let final_stage = String::new();
        for stage in stages.iter().chain(std::iter::once(&final_stage)) {
            let image = tagged_image_name(repository_url, Some(stage.as_str()), None);
            let result = self.policy.run_can_fail(&["pull", image.as_str()], true).await;
            if !result.success() {
                tracing::debug!("cache miss: {}", image);
                continue;
            }
            cache_from.push(image);
        }
        Some(cache_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Invocation;
    use crate::testing::{FakeRunner, RecordingSink, failed, ok};
    use std::sync::Arc;

    fn resolver(runner: Arc<FakeRunner>) -> CacheResolver {
        CacheResolver::new(CommandPolicy::new(
            runner,
            Arc::new(RecordingSink::default()),
            "docker",
        ))
    }

    fn stages(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_pulls_each_stage_then_final() {
        let runner = Arc::new(FakeRunner::new(|_| ok("")));
        let cache = resolver(runner.clone())
            .resolve_cache("app", &stages(&["builder"]), Some("repo"))
            .await;

        assert_eq!(cache, Some(stages(&["repo:builder", "repo"])));
        assert_eq!(runner.commands(), vec!["pull repo:builder", "pull repo"]);
        assert!(runner.calls().iter().all(|c| c.report_error_as_warning));
    }

    #[tokio::test]
    async fn test_failed_pull_is_skipped() {
        let runner = Arc::new(FakeRunner::new(|inv: &Invocation| {
            if inv.args[1] == "repo:builder" {
                failed(1, "")
            } else {
                ok("")
            }
        }));
        let cache = resolver(runner.clone())
            .resolve_cache("app", &stages(&["builder"]), Some("repo"))
            .await;

        assert_eq!(cache, Some(stages(&["repo"])));
        assert_eq!(runner.count("pull"), 2);
    }

    #[tokio::test]
    async fn test_all_pulls_failing_yields_empty_list() {
        let runner = Arc::new(FakeRunner::new(|_| failed(1, "")));
        let cache = resolver(runner)
            .resolve_cache("app", &stages(&["deps", "builder"]), Some("repo"))
            .await;

        assert_eq!(cache, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_no_repository_means_no_cache() {
        let runner = Arc::new(FakeRunner::new(|_| ok("")));
        let cache = resolver(runner.clone())
            .resolve_cache("app", &stages(&["builder"]), None)
            .await;

        assert_eq!(cache, None);
        assert!(runner.calls().is_empty());
    }
}
