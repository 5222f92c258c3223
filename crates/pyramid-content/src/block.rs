//! Blocks: the atomic unit of chapter content

use crate::ids::{BlockId, ChapterId, FigureId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// List sub-kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Unordered list
    Bullet,
    /// Ordered list
    Numbered,
}

/// Block type
///
/// Serialized with the store's wire names (`paragraph`, `heading2`, ...,
/// `list` plus a `list_type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockType {
    /// Plain paragraph
    Paragraph,
    /// `##` heading
    Heading2,
    /// `###` heading
    Heading3,
    /// `####` heading
    Heading4,
    /// Quoted text
    Blockquote,
    /// Bullet or numbered list (one item per line)
    List {
        /// Sub-kind
        list_type: ListKind,
    },
    /// Markdown table source
    Table,
    /// Code listing
    Code,
    /// Figure reference; content is always empty
    Figure,
}

impl BlockType {
    /// Bullet list shorthand
    pub const BULLET_LIST: Self = Self::List {
        list_type: ListKind::Bullet,
    };

    /// Numbered list shorthand
    pub const NUMBERED_LIST: Self = Self::List {
        list_type: ListKind::Numbered,
    };

    /// Types offered by the block-type menu, in display order
    #[must_use]
    pub fn menu_choices() -> [BlockType; 10] {
        [
            Self::Paragraph,
            Self::Heading2,
            Self::Heading3,
            Self::Heading4,
            Self::BULLET_LIST,
            Self::NUMBERED_LIST,
            Self::Blockquote,
            Self::Table,
            Self::Code,
            Self::Figure,
        ]
    }

    /// Human-readable menu label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paragraph => "Text",
            Self::Heading2 => "Heading 2",
            Self::Heading3 => "Heading 3",
            Self::Heading4 => "Heading 4",
            Self::Blockquote => "Quote",
            Self::List {
                list_type: ListKind::Bullet,
            } => "Bulleted list",
            Self::List {
                list_type: ListKind::Numbered,
            } => "Numbered list",
            Self::Table => "Table",
            Self::Code => "Code",
            Self::Figure => "Figure",
        }
    }

    /// Whether the block carries editable text
    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Figure)
    }

    /// Heading level for heading types
    #[inline]
    #[must_use]
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Self::Heading2 => Some(2),
            Self::Heading3 => Some(3),
            Self::Heading4 => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A typed, ordered piece of chapter content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block id
    pub id: BlockId,
    /// Owning chapter
    pub chapter_id: ChapterId,
    /// Block type
    #[serde(flatten)]
    pub block_type: BlockType,
    /// Markdown-ish source (empty for figures)
    pub content: String,
    /// Linked figure record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_id: Option<FigureId>,
    /// Fractional order key
    pub order: f64,
}

impl Block {
    /// Create a block with a fresh id
    #[must_use]
    pub fn new(
        chapter_id: ChapterId,
        block_type: BlockType,
        content: impl Into<String>,
        order: f64,
    ) -> Self {
        Self::with_id(BlockId::new(), chapter_id, block_type, content, order)
    }

    /// Create a block with a known id (e.g. one returned by the store)
    #[must_use]
    pub fn with_id(
        id: BlockId,
        chapter_id: ChapterId,
        block_type: BlockType,
        content: impl Into<String>,
        order: f64,
    ) -> Self {
        let content = if block_type.is_text() {
            content.into()
        } else {
            String::new()
        };
        Self {
            id,
            chapter_id,
            block_type,
            content,
            figure_id: None,
            order,
        }
    }

    /// Attach a figure reference
    #[inline]
    #[must_use]
    pub fn with_figure(mut self, figure_id: FigureId) -> Self {
        self.figure_id = Some(figure_id);
        self
    }

    /// Content length in characters
    #[inline]
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether the block has no content
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether the content fits on one line
    #[inline]
    #[must_use]
    pub fn is_single_line(&self) -> bool {
        !self.content.contains('\n')
    }
}

/// Caret position inside a block, counted in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextCursor {
    /// Character offset from the start of the content
    pub offset: usize,
}

impl TextCursor {
    /// Cursor at a character offset
    #[inline]
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self { offset }
    }

    /// Cursor at the start of any content
    #[inline]
    #[must_use]
    pub const fn start() -> Self {
        Self { offset: 0 }
    }

    /// Cursor at the end of `content`
    #[inline]
    #[must_use]
    pub fn end_of(content: &str) -> Self {
        Self {
            offset: content.chars().count(),
        }
    }

    /// Whether the cursor sits at offset zero
    #[inline]
    #[must_use]
    pub const fn is_at_start(&self) -> bool {
        self.offset == 0
    }

    /// Whether the cursor sits at (or past) the end of `content`
    #[inline]
    #[must_use]
    pub fn is_at_end(&self, content: &str) -> bool {
        self.offset >= content.chars().count()
    }

    /// Byte index for this cursor in `content`, clamped to its length
    #[must_use]
    pub fn byte_index(&self, content: &str) -> usize {
        content
            .char_indices()
            .nth(self.offset)
            .map_or(content.len(), |(idx, _)| idx)
    }

    /// Split `content` into the text before and after the cursor
    #[must_use]
    pub fn split(&self, content: &str) -> (String, String) {
        let idx = self.byte_index(content);
        (content[..idx].to_string(), content[idx..].to_string())
    }

    /// Insert `text` at the cursor, returning the new content
    #[must_use]
    pub fn insert(&self, content: &str, text: &str) -> String {
        let idx = self.byte_index(content);
        let mut out = String::with_capacity(content.len() + text.len());
        out.push_str(&content[..idx]);
        out.push_str(text);
        out.push_str(&content[idx..]);
        out
    }
}
