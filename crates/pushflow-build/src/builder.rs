use crate::command::CommandPolicy;
use crate::error::{BuildError, Result};
use crate::log::Severity;
use crate::request::{BuildOutput, BuildSpec};
/// ステージ用のローカルイメージ名
pub fn local_stage_image_name(image_name: &str, stage: &str) -> String {
    format!("{}-{}", image_name, stage)
}

pub struct ImageBuilder {
    policy: CommandPolicy,
}

impl ImageBuilder {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// イメージをビルド
    ///
    /// Cached stages are built first, one after another in declaration
    /// order, then the final untargeted image. The digest of the final image
    /// is read back with `image inspect`.
    pub async fn build_image(
        &self,
        image_name: &str,
        spec: &BuildSpec,
        cache_from: &[String],
    ) -> Result<BuildOutput> {
        self.policy
            .sink()
            .report_result(&describe_build(image_name, spec), Severity::Info, None);
        for key in spec.build_args.keys() {
            self.validate_build_arg(key);
        }

        let mut stages = Vec::new();
        for stage in spec.cache_stages() {
            self.docker_build(
                &local_stage_image_name(image_name, stage),
                spec,
                cache_from,
                Some(stage.as_str()),
            )
            .await?;
            stages.push(stage.clone());
        }

        self.docker_build(image_name, spec, cache_from, None).await?;

        let inspect = self
            .policy
            .run_must_succeed(&["image", "inspect", "-f", "{{.Id}}", image_name], true, None, None)
            .await?;
        let digest = inspect.trim();
        if digest.is_empty() {
            return Err(BuildError::InternalInvariant(format!(
                "No digest available for image {}",
                image_name
            )));
        }

        Ok(BuildOutput {
            image_id: image_id_from_digest(digest).to_string(),
            stages,
        })
    }

    async fn docker_build(
        &self,
        image_name: &str,
        spec: &BuildSpec,
        cache_from: &[String],
        target: Option<&str>,
    ) -> Result<()> {
        tracing::info!("Building image: {}", image_name);

        let args = build_args(image_name, spec, cache_from, target);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.policy
            .run_must_succeed(&args, true, None, Some(&spec.env))
            .await?;

        tracing::info!("Successfully built: {}", image_name);
        Ok(())
    }

    /// ビルド引数の検証（機密情報の警告）
    fn validate_build_arg(&self, key: &str) {
        let sensitive_patterns = ["password", "token", "secret", "api_key", "private_key"];

        let key_lower = key.to_lowercase();
        if sensitive_patterns.iter().any(|p| key_lower.contains(p)) {
            self.policy.sink().report_result(
                &format!(
                    "Build arg '{}' may contain sensitive data; build args are recorded in the image history",
                    key
                ),
                Severity::Warning,
                None,
            );
        }
    }
}

/// `docker build` の引数を組み立てる
pub fn build_args(
    image_name: &str,
    spec: &BuildSpec,
    cache_from: &[String],
    target: Option<&str>,
) -> Vec<String> {
    let mut args = vec!["build".to_string()];

    if let Some(dockerfile) = &spec.dockerfile {
        args.push("-f".to_string());
        args.push(dockerfile.display().to_string());
    }

    for (key, value) in &spec.build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", key, value));
    }

    if spec.wants_cache() && !cache_from.is_empty() {
        args.push("--cache-from".to_string());
        args.push(cache_from.join(","));
    }

    args.extend(spec.extra_options.iter().cloned());

    args.push(spec.context_or_default().display().to_string());
    args.push("-t".to_string());
    args.push(image_name.to_string());

    if let Some(target) = target {
        args.push("--target".to_string());
        args.push(target.to_string());
    }

    args
}

/// `sha256:abcd...` から `abcd...` を取り出す
pub fn image_id_from_digest(digest: &str) -> &str {
    match digest.rfind(':') {
        Some(pos) => &digest[pos + 1..],
        None => digest,
    }
}

fn describe_build(image_name: &str, spec: &BuildSpec) -> String {
    let mut message = format!(
        "Building container image '{}': context={}",
        image_name,
        spec.context_or_default().display()
    );
    if let Some(dockerfile) = &spec.dockerfile {
        message.push_str(&format!(", dockerfile={}", dockerfile.display()));
    }
    if !spec.build_args.is_empty()
        && let Ok(args) = serde_json::to_string(&spec.build_args)
    {
        message.push_str(&format!(", args={}", args));
    }
    message
}
