//! イメージプッシュ処理
//!
//! ビルドしたイメージにタグを付けてコンテナレジストリにプッシュします。

use crate::builder::local_stage_image_name;
use crate::command::CommandPolicy;
use crate::error::Result;
use crate::reference::tagged_image_name;
use crate::request::BuildOutput;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    policy: CommandPolicy,
}

impl ImagePusher {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// ビルド結果一式をプッシュ
    ///
    /// Order: `repo:[tag-]id`, then `repo:tag` when a user tag exists, then
    /// one `repo:<stage>` per cached stage.
    pub async fn push_build(
        &self,
        image_name: &str,
        repository_url: &str,
        tag: Option<&str>,
        output: &BuildOutput,
    ) -> Result<()> {
        self.tag_and_push(image_name, repository_url, tag, Some(output.image_id.as_str()))
            .await?;

        // ステージのキャッシュは新しいビルドで上書きされる前提なので id を付けない
        for stage in &output.stages {
            self.tag_and_push(
                &local_stage_image_name(image_name, stage),
                repository_url,
                Some(stage.as_str()),
                None,
            )
            .await?;
        }
        Ok(())
    }

    /// タグ付けしてプッシュ
    ///
    /// The id-salted name is unique to this build. When a user tag was given
    /// the image is also pushed to the plain `repo:tag`, which later pushes
    /// may overwrite.
    pub async fn tag_and_push(
        &self,
        image_name: &str,
        repository_url: &str,
        tag: Option<&str>,
        image_id: Option<&str>,
    ) -> Result<()> {
        self.do_tag_and_push(image_name, &tagged_image_name(repository_url, tag, image_id))
            .await?;

        if tag.is_some() && image_id.is_some() {
            self.do_tag_and_push(image_name, &tagged_image_name(repository_url, tag, None))
                .await?;
        }
        Ok(())
    }

    async fn do_tag_and_push(&self, image_name: &str, target_name: &str) -> Result<()> {
        tracing::debug!("Pushing {} as {}", image_name, target_name);
        self.policy
            .run_must_succeed(&["tag", image_name, target_name], true, None, None)
            .await?;
        self.policy
            .run_must_succeed(&["push", target_name], true, None, None)
            .await?;
        Ok(())
    }
}
