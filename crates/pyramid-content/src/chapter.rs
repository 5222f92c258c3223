//! Drafts and chapters

use crate::ids::{ChapterId, DraftId, PartId};
use serde::{Deserialize, Serialize};

/// Chapter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterKind {
    /// Front matter
    Intro,
    /// Numbered body chapter
    #[default]
    Chapter,
    /// Back matter
    Appendix,
}

/// A named version of the whole ebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Draft id
    pub id: DraftId,
    /// Display name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this is the draft readers see
    #[serde(default)]
    pub is_active: bool,
}

impl Draft {
    /// Create an inactive draft
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DraftId::new(),
            name: name.into(),
            description: None,
            is_active: false,
        }
    }

    /// Mark as the active draft
    #[inline]
    #[must_use]
    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }
}

/// An ordered container of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter id
    pub id: ChapterId,
    /// Owning draft
    pub draft_id: DraftId,
    /// URL slug
    pub slug: String,
    /// Display title
    pub title: String,
    /// Chapter number (body chapters only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<u32>,
    /// Part grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<PartId>,
    /// Kind
    #[serde(default, rename = "type")]
    pub kind: ChapterKind,
    /// Position among the draft's chapters
    #[serde(default)]
    pub order: u32,
}

impl Chapter {
    /// Create a body chapter; the slug is derived from the title
    #[must_use]
    pub fn new(draft_id: DraftId, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: ChapterId::new(),
            draft_id,
            slug: slugify(&title),
            title,
            chapter_number: None,
            part_id: None,
            kind: ChapterKind::Chapter,
            order: 0,
        }
    }

    /// Set chapter number
    #[inline]
    #[must_use]
    pub fn with_number(mut self, number: u32) -> Self {
        self.chapter_number = Some(number);
        self
    }

    /// Set kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: ChapterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set part grouping
    #[inline]
    #[must_use]
    pub fn in_part(mut self, part_id: PartId) -> Self {
        self.part_id = Some(part_id);
        self
    }

    /// Heading shown above the chapter body
    #[must_use]
    pub fn display_heading(&self) -> String {
        match (self.kind, self.chapter_number) {
            (ChapterKind::Chapter, Some(n)) => format!("Chapter {n}: {}", self.title),
            _ => self.title.clone(),
        }
    }
}

/// Lowercase, hyphen-separated slug
#[must_use]
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_title() {
        assert_eq!(slugify("The Pivot Pyramid: An Intro!"), "the-pivot-pyramid-an-intro");
        assert_eq!(slugify("  leading"), "leading");
    }

    #[test]
    fn display_heading_numbers_body_chapters() {
        let draft = Draft::new("v1");
        let chapter = Chapter::new(draft.id, "Customers").with_number(2);
        assert_eq!(chapter.display_heading(), "Chapter 2: Customers");

        let intro = Chapter::new(draft.id, "Preface").with_kind(ChapterKind::Intro);
        assert_eq!(intro.display_heading(), "Preface");
    }

    #[test]
    fn chapter_kind_serializes_as_type() {
        let chapter = Chapter::new(DraftId::new(), "Appendix A").with_kind(ChapterKind::Appendix);
        let json = serde_json::to_value(&chapter).unwrap();
        assert_eq!(json["type"], "appendix");
        assert_eq!(json["slug"], "appendix-a");
    }
}
