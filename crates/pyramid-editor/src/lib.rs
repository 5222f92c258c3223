//! Pyramid Editor
//!
//! Block-based chapter editing: a local edit buffer with batched saves, a
//! chapter session that gates saves and keeps a dismissible error banner,
//! a UI-agnostic editor surface driven by key events, and the figure
//! subsystem.
//!
//! # Architecture
//!
//! ```text
//! KeyEvent ─▶ EditorSurface ─▶ ChapterSession ─▶ EditBuffer ─▶ BlockStore
//!                  │                                 (insert: immediate,
//!                  └─▶ FigureService ─▶ FigureStore   edits: batched save)
//! ```
//!
//! # Example
//!
//! ```rust
//! use pyramid_content::{BlockType, ChapterId, TextCursor};
//! use pyramid_editor::{ChapterSession, EditBuffer, EditorSurface, Key, KeyEvent};
//! use pyramid_store::MemoryBackend;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryBackend::new());
//! let mut buffer = EditBuffer::new(store.clone(), ChapterId::new());
//! let id = buffer
//!     .insert_block_with_content(None, BlockType::Paragraph, "Hello world")
//!     .await
//!     .unwrap();
//!
//! let mut surface = EditorSurface::new(Arc::new(ChapterSession::new(buffer)));
//! surface
//!     .handle_key(id, KeyEvent::new(Key::Enter, TextCursor::at(6)))
//!     .await;
//!
//! let contents: Vec<_> = surface.blocks().await.into_iter().map(|b| b.content).collect();
//! assert_eq!(contents, vec!["Hello ", "world"]);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod figures;
pub mod session;
pub mod surface;

pub use buffer::{EditBuffer, PendingSave, RemoteApply};
pub use config::EditorConfig;
pub use error::EditorError;
pub use figures::{
    FigureGenerator, FigureRequest, FigureService, FigureUrlCache, FigureView, GeneratedFigure,
    GenerationTarget, LinkOutcome,
};
pub use session::{ChapterSession, SaveOutcome};
pub use surface::{Caret, EditorEffect, EditorSurface, Focus, Key, KeyEvent, MenuState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
