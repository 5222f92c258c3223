//! YAML frontmatter carrying chapter metadata

use crate::error::MarkupError;
use pyramid_content::ChapterKind;
use serde::{Deserialize, Serialize};

/// Chapter fields a markdown file can declare up front
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChapterMeta {
    /// URL slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Chapter number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    /// Intro, chapter or appendix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChapterKind>,
}

/// Split leading `---` frontmatter off a document.
///
/// Returns the metadata and the byte offset where the body starts. A
/// document without frontmatter has offset 0.
pub(crate) fn split(source: &str) -> Result<(Option<ChapterMeta>, usize), MarkupError> {
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return Ok((None, 0));
    };
    let opening = source.len() - rest.len();

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let meta = serde_yaml::from_str(yaml).map_err(|e| MarkupError::Frontmatter {
                // The opening fence is line 1
                line: e.location().map_or(1, |l| l.line() + 1),
                message: e.to_string(),
            })?;
            return Ok((Some(meta), opening + offset + line.len()));
        }
        offset += line.len();
    }
    // No closing fence: not frontmatter, the `---` is an ordinary rule
    Ok((None, 0))
}

/// Frontmatter block for `meta`, including both fences
pub(crate) fn render(meta: &ChapterMeta) -> Result<String, MarkupError> {
    let yaml = serde_yaml::to_string(meta).map_err(|e| MarkupError::Frontmatter {
        line: 1,
        message: e.to_string(),
    })?;
    Ok(format!("---\n{yaml}---"))
}
