//! イメージ名・リポジトリURLの解析
//!
//! Tag names may only contain ASCII letters, digits, `_`, `.` and `-`, so the
//! last `:` is the only candidate separator. It can also be a registry port
//! (`localhost:5000/app`), which is what the heuristic below tells apart.

use crate::error::{BuildError, Result};

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", Some("v1.0"))`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", None)`
/// - `localhost:5000/app` -> `("localhost:5000/app", None)`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", Some("dev"))`
pub fn image_name_and_tag(image: &str) -> (&str, Option<&str>) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        if !looks_like_port(potential_tag) {
            return (&image[..pos], Some(potential_tag));
        }
    }
    (image, None)
}

/// ポート番号: 数字のみ、またはその後に `/...` が続く
fn looks_like_port(segment: &str) -> bool {
    let digits = segment.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && (digits == segment.len() || segment.as_bytes()[digits] == b'/')
}

/// リポジトリURLにタグが含まれていないことを確認
pub fn check_repository_url(repository_url: &str) -> Result<()> {
    if let (_, Some(tag)) = image_name_and_tag(repository_url) {
        return Err(BuildError::MalformedInput(format!(
            "[repositoryUrl] should not contain a tag: {}",
            tag
        )));
    }
    Ok(())
}

/// `repository_url[:tag-image_id]` 形式の名前を生成
///
/// Empty pieces count as absent. No validation of the tag is done here; a
/// malformed tag makes the later `tag` invocation fail.
pub fn tagged_image_name(repository_url: &str, tag: Option<&str>, image_id: Option<&str>) -> String {
    let pieces: Vec<&str> = [tag, image_id]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

    if pieces.is_empty() {
        repository_url.to_string()
    } else {
        format!("{}:{}", repository_url, pieces.join("-"))
    }
}
