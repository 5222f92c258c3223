//! Chapter documents exchanged with markdown

use crate::figure_spec::FigureSpec;
use crate::frontmatter::ChapterMeta;
use pyramid_content::{Block, BlockId, ChapterId, FigureId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Image behind a linked figure block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureImage {
    /// Alt text
    pub alt: String,
    /// Image URL
    pub src: String,
    /// Optional caption, rendered as the image title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A chapter as ordered blocks plus what figure blocks point at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDocument {
    /// Chapter the blocks belong to
    pub chapter_id: ChapterId,
    /// Frontmatter metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ChapterMeta>,
    /// Chapter title (the document's first `#` heading)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Blocks in document order
    pub blocks: Vec<Block>,
    /// Images for linked figure blocks
    #[serde(default)]
    pub figures: BTreeMap<FigureId, FigureImage>,
    /// Authored specs for figure blocks that came from a spec
    #[serde(default)]
    pub specs: BTreeMap<BlockId, FigureSpec>,
}

impl ChapterDocument {
    /// Empty document for a chapter
    #[must_use]
    pub fn new(chapter_id: ChapterId) -> Self {
        Self {
            chapter_id,
            meta: None,
            title: None,
            blocks: Vec::new(),
            figures: BTreeMap::new(),
            specs: BTreeMap::new(),
        }
    }

    /// Figure specs without an image yet, in document order
    pub fn pending(&self) -> impl Iterator<Item = &FigureSpec> {
        self.blocks
            .iter()
            .filter_map(|block| self.specs.get(&block.id))
            .filter(|spec| !spec.is_locked())
    }

    pub(crate) fn next_order(&self) -> f64 {
        self.blocks.last().map_or(0.0, |b| b.order + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_content::BlockType;

    #[test]
    fn json_keeps_figure_links() {
        let chapter = ChapterId::new();
        let figure_id = FigureId::new();
        let mut doc = ChapterDocument::new(chapter);
        doc.blocks
            .push(Block::new(chapter, BlockType::Figure, "", 0.0).with_figure(figure_id));
        doc.figures.insert(
            figure_id,
            FigureImage {
                alt: "Pyramid".into(),
                src: "https://cdn.example.com/p.png".into(),
                caption: None,
            },
        );

        let json = serde_json::to_string(&doc).unwrap();
        let back: ChapterDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.next_order(), 1.0);
    }
}
