//! Pyramid Store
//!
//! Contracts for the hosted collaborators the editor depends on, plus an
//! in-memory backend that implements all of them.
//!
//! # Collaborators
//!
//! - [`BlockStore`]: ordered typed blocks per chapter (immediate inserts, batched edits)
//! - [`FigureStore`]: figure records and their block links
//! - [`ImageStorage`]: content-addressed image bytes
//! - [`ImageGenerator`] / [`PromptEnhancer`]: external AI services
//! - [`ImageFetcher`]: downloads remote generation results ([`HttpImageFetcher`])
//!
//! Every remote call made by the editor is wrapped in [`timeout::bounded`].
//!
//! # Example
//!
//! ```rust
//! use pyramid_content::{BlockType, ChapterId};
//! use pyramid_store::{BlockStore, InsertBlock, MemoryBackend};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryBackend::new();
//! let chapter = ChapterId::new();
//! let id = store
//!     .insert_block(InsertBlock {
//!         chapter_id: chapter,
//!         block_type: BlockType::Paragraph,
//!         content: "Start here.".into(),
//!         order: 0.0,
//!         after_block_id: None,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(store.block(id).unwrap().content, "Start here.");
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod generation;
mod http;
mod memory;
mod ops;
pub mod timeout;
mod traits;

pub use error::StoreError;
pub use generation::{GeneratedImage, GenerationRequest, GenerationResponse, ImagePayload};
pub use http::HttpImageFetcher;
pub use memory::{CallLog, FailPoint, MemoryBackend};
pub use ops::{BatchOp, InsertBlock};
pub use traits::{
    BlockStore, FigureStore, ImageFetcher, ImageGenerator, ImageStorage, PromptEnhancer,
    TemplateEnhancer,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
