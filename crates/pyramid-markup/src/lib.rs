//! Pyramid Markup
//!
//! Markdown tooling for chapters:
//!
//! - [`figure_spec`]: fenced `figure` specs (parse, validate, lock, render, pending)
//! - [`import()`]: chapter markdown (with optional YAML frontmatter) → ordered blocks
//! - [`export()`]: ordered blocks → chapter markdown
//!
//! # Example
//!
//! ```rust
//! use pyramid_markup::figure_spec::{self, RenderOptions};
//!
//! let doc = "```figure\nid: fig-a\nprompt: A pyramid\nalt: Pyramid\nsrc: a.png\n```\n";
//! let out = figure_spec::render(doc, RenderOptions::default()).unwrap();
//! assert_eq!(out, "![Pyramid](a.png)\n");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod document;
mod error;
mod export;
pub mod figure_spec;
mod frontmatter;
mod import;

pub use document::{ChapterDocument, FigureImage};
pub use error::MarkupError;
pub use export::{block_markdown, export};
pub use figure_spec::{FigureSpec, LocatedSpec, RenderOptions};
pub use frontmatter::ChapterMeta;
pub use import::{import, EMPTY_FIGURE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
