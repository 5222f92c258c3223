//! Pyramid Content Model
//!
//! Typed content records for the ebook: drafts own chapters and figures,
//! chapters are built from ordered, typed blocks.
//!
//! # Core Concepts
//!
//! - [`Block`]: atomic unit of chapter content with a floating-point order key
//! - [`BlockType`]: closed set of block kinds (paragraph, headings, list, ...)
//! - [`Chapter`] / [`Draft`]: containers; chapters are never reordered by the editor
//! - [`Figure`]: image asset with optional generation provenance
//! - [`ordering`]: midpoint interpolation and renumbering of order keys
//! - [`StorageRef`]: content-addressed reference to an uploaded image
//!
//! # Example
//!
//! ```rust
//! use pyramid_content::ordering;
//!
//! assert_eq!(ordering::insert_after(None, None), 0.0);
//! assert_eq!(ordering::insert_after(Some(1.0), Some(2.0)), 1.5);
//! assert_eq!(ordering::insert_after(Some(4.0), None), 5.0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod block;
mod chapter;
mod error;
mod figure;
mod ids;
pub mod ordering;
mod storage;

pub use block::{Block, BlockType, ListKind, TextCursor};
pub use chapter::{Chapter, ChapterKind, Draft};
pub use error::ContentError;
pub use figure::{
    AspectRatio, Figure, FigureKey, FigureStyle, FigureUpdate, NewFigure, Provenance, Resolution,
};
pub use ids::{BlockId, ChapterId, DraftId, FigureId, IdError, PartId};
pub use storage::{StorageRef, StorageRefError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn chapter_blocks_sort_into_document_order() {
        let chapter = ChapterId::new();
        let mut blocks = vec![
            Block::new(chapter, BlockType::Paragraph, "third", 2.0),
            Block::new(chapter, BlockType::Heading2, "first", -1.0),
            Block::new(chapter, BlockType::Paragraph, "second", 0.5),
        ];

        ordering::sort_blocks(&mut blocks);

        let contents: Vec<_> = blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn figure_block_links_to_figure_record() {
        let draft = DraftId::new();
        let chapter = ChapterId::new();
        let figure = Figure::new(
            draft,
            FigureKey::parse("fig-overview").unwrap(),
            StorageRef::compute(b"png bytes"),
            "The pyramid",
        );

        let block = Block::new(chapter, BlockType::Figure, "", 0.0).with_figure(figure.id);

        assert_eq!(block.figure_id, Some(figure.id));
        assert!(block.content.is_empty());
    }
}
