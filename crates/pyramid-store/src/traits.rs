//! Collaborator contracts
//!
//! The hosted backend owns persistence, durability and read consistency.
//! Everything in the editor talks to it through these traits, so any
//! platform (or the in-memory backend in tests) can stand behind them.

use crate::error::StoreError;
use crate::generation::{GenerationRequest, GenerationResponse};
use crate::ops::{BatchOp, InsertBlock};
use async_trait::async_trait;
use pyramid_content::{
    Block, BlockId, ChapterId, DraftId, Figure, FigureId, FigureKey, FigureStyle, FigureUpdate,
    NewFigure, Provenance, StorageRef,
};

/// Persistent, ordered collection of typed blocks per chapter
#[async_trait]
pub trait BlockStore: Send + Sync + std::fmt::Debug {
    /// Persist a new block immediately and return its id
    async fn insert_block(&self, request: InsertBlock) -> Result<BlockId, StoreError>;

    /// Apply updates, reorders and deletes as one batch.
    ///
    /// Operations apply in the order given.
    async fn batch_edit(&self, chapter_id: ChapterId, ops: Vec<BatchOp>)
        -> Result<(), StoreError>;

    /// All blocks of a chapter (any order)
    async fn get_blocks(&self, chapter_id: ChapterId) -> Result<Vec<Block>, StoreError>;
}

/// Figure records owned by drafts
#[async_trait]
pub trait FigureStore: Send + Sync + std::fmt::Debug {
    /// Create a figure record from validated input
    async fn create_figure(&self, draft_id: DraftId, figure: NewFigure)
        -> Result<FigureId, StoreError>;

    /// Create a figure for an uploaded image.
    ///
    /// Uploads carry no authored key, so one is derived from the stored bytes.
    async fn create_figure_from_upload(
        &self,
        draft_id: DraftId,
        storage_ref: StorageRef,
        alt: String,
        caption: Option<String>,
    ) -> Result<FigureId, StoreError> {
        let figure_key = FigureKey::parse(format!("upload-{}", storage_ref.short()))
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
        self.create_figure(
            draft_id,
            NewFigure {
                figure_key,
                storage_ref,
                alt,
                caption,
                provenance: None,
            },
        )
        .await
    }

    /// Point a figure at new image bytes; identity, alt and caption are kept
    async fn replace_figure_image(
        &self,
        figure_id: FigureId,
        storage_ref: StorageRef,
        provenance: Option<Provenance>,
    ) -> Result<(), StoreError>;

    /// Edit metadata fields
    async fn update_figure(&self, figure_id: FigureId, update: FigureUpdate)
        -> Result<(), StoreError>;

    /// Record the block↔figure link on both records
    async fn link_figure_to_block(
        &self,
        block_id: BlockId,
        figure_id: FigureId,
    ) -> Result<(), StoreError>;

    /// Clear a block's figure link
    async fn unlink_figure(&self, block_id: BlockId) -> Result<(), StoreError>;

    /// Look up one figure
    async fn get_figure(&self, figure_id: FigureId) -> Result<Option<Figure>, StoreError>;

    /// Figure linked from a block, if any
    async fn figure_for_block(&self, block_id: BlockId) -> Result<Option<Figure>, StoreError>;

    /// Figures owned by a draft
    async fn figures_for_draft(&self, draft_id: DraftId) -> Result<Vec<Figure>, StoreError>;

    /// Public URL for stored bytes, if the storage still has them
    async fn get_figure_url(&self, storage_ref: StorageRef) -> Result<Option<String>, StoreError>;
}

/// Binary storage for image bytes
#[async_trait]
pub trait ImageStorage: Send + Sync + std::fmt::Debug {
    /// Store bytes and return their reference
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<StorageRef, StoreError>;
}

/// External image generation API
#[async_trait]
pub trait ImageGenerator: Send + Sync + std::fmt::Debug {
    /// Generate images for a (style-enhanced) prompt
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, StoreError>;
}

/// LLM prompt-rewriting step run before generation
#[async_trait]
pub trait PromptEnhancer: Send + Sync + std::fmt::Debug {
    /// Rewrite `prompt` for `style`
    async fn enhance(&self, prompt: &str, style: FigureStyle) -> Result<String, StoreError>;
}

/// Fetches remote image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync + std::fmt::Debug {
    /// Download `url`, returning bytes and content type
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), StoreError>;
}

/// Enhancer that appends the style's template text; no network involved
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEnhancer;

#[async_trait]
impl PromptEnhancer for TemplateEnhancer {
    async fn enhance(&self, prompt: &str, style: FigureStyle) -> Result<String, StoreError> {
        Ok(style.apply(prompt))
    }
}
