//! Block↔figure linkage, metadata edits and uploads

use super::cache::FigureUrlCache;
use crate::config::EditorConfig;
use crate::error::EditorError;
use pyramid_content::{
    Block, BlockId, ContentError, DraftId, Figure, FigureId, FigureUpdate, StorageRef,
};
use pyramid_store::{timeout, FigureStore, ImageStorage};
use std::sync::Arc;
use tracing::{debug, info};

/// What a figure block should display
#[derive(Debug, Clone, PartialEq)]
pub enum FigureView {
    /// No figure linked, or the record is gone
    Placeholder,
    /// Linked figure and its public URL, if the bytes are available
    Ready {
        /// Figure record
        figure: Figure,
        /// Public URL
        url: Option<String>,
    },
}

/// Result of linking a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkOutcome {
    /// Block that stopped showing the figure
    pub detached: Option<BlockId>,
}

/// Figure operations used by the editor
#[derive(Debug, Clone)]
pub struct FigureService {
    store: Arc<dyn FigureStore>,
    storage: Arc<dyn ImageStorage>,
    urls: FigureUrlCache,
    config: EditorConfig,
}

impl FigureService {
    /// Service over a figure store and image storage
    #[must_use]
    pub fn new(
        store: Arc<dyn FigureStore>,
        storage: Arc<dyn ImageStorage>,
        config: EditorConfig,
    ) -> Self {
        let urls = FigureUrlCache::new(config.url_cache_capacity);
        Self {
            store,
            storage,
            urls,
            config,
        }
    }

    /// Display state for a block
    ///
    /// # Errors
    /// The store failure
    pub async fn view(&self, block: &Block) -> Result<FigureView, EditorError> {
        let Some(figure_id) = block.figure_id else {
            return Ok(FigureView::Placeholder);
        };
        let Some(figure) = self.fetch(figure_id).await? else {
            debug!(block = %block.id, figure = %figure_id, "linked figure no longer exists");
            return Ok(FigureView::Placeholder);
        };
        let url = self.url(figure.storage_ref).await?;
        Ok(FigureView::Ready { figure, url })
    }

    /// Public URL for stored bytes (cached)
    ///
    /// # Errors
    /// The store failure
    pub async fn url(&self, storage_ref: StorageRef) -> Result<Option<String>, EditorError> {
        Ok(timeout::bounded(
            self.config.mutation_timeout(),
            self.urls.resolve(self.store.as_ref(), storage_ref),
        )
        .await?)
    }

    /// Link `figure_id` to `block_id`.
    ///
    /// With one-figure-per-block enforcement, a figure shown elsewhere is
    /// rejected; use [`Self::relink`] to move it.
    ///
    /// # Errors
    /// `UnknownFigure`, `FigureAlreadyLinked`, or the store failure
    pub async fn link(&self, block_id: BlockId, figure_id: FigureId) -> Result<LinkOutcome, EditorError> {
        let figure = self.require(figure_id).await?;
        match self.holder(&figure).await? {
            Some(current) if current == block_id => return Ok(LinkOutcome::default()),
            Some(current) if self.config.one_figure_per_block => {
                return Err(EditorError::FigureAlreadyLinked {
                    figure_id,
                    block_id: current,
                });
            }
            _ => {}
        }
        self.write_link(block_id, figure_id).await?;
        Ok(LinkOutcome::default())
    }

    /// Move `figure_id` to `block_id`, detaching it from its current block
    ///
    /// # Errors
    /// `UnknownFigure`, or the store failure
    pub async fn relink(&self, block_id: BlockId, figure_id: FigureId) -> Result<LinkOutcome, EditorError> {
        let figure = self.require(figure_id).await?;
        let detached = self
            .holder(&figure)
            .await?
            .filter(|current| *current != block_id);
        if let Some(previous) = detached {
            timeout::bounded(self.config.mutation_timeout(), self.store.unlink_figure(previous))
                .await?;
        }
        self.write_link(block_id, figure_id).await?;
        Ok(LinkOutcome { detached })
    }

    /// Clear a block's figure
    ///
    /// # Errors
    /// The store failure
    pub async fn unlink(&self, block_id: BlockId) -> Result<(), EditorError> {
        timeout::bounded(self.config.mutation_timeout(), self.store.unlink_figure(block_id)).await?;
        Ok(())
    }

    /// Edit alt text, caption or figure id
    ///
    /// # Errors
    /// `Validation` before any network call, or the store failure
    pub async fn update_metadata(&self, figure_id: FigureId, update: FigureUpdate) -> Result<(), EditorError> {
        update.validate()?;
        if update.is_empty() {
            return Ok(());
        }
        timeout::bounded(
            self.config.mutation_timeout(),
            self.store.update_figure(figure_id, update),
        )
        .await?;
        info!(figure = %figure_id, "figure metadata updated");
        Ok(())
    }

    /// Store uploaded bytes and create a figure for them
    ///
    /// # Errors
    /// `Validation` for blank alt or empty bytes, or the store failure
    pub async fn create_from_upload(
        &self,
        draft_id: DraftId,
        bytes: Vec<u8>,
        content_type: &str,
        alt: impl Into<String>,
        caption: Option<String>,
    ) -> Result<FigureId, EditorError> {
        let alt = alt.into();
        if alt.trim().is_empty() {
            return Err(ContentError::missing("alt").into());
        }
        let storage_ref = self.upload(bytes, content_type).await?;
        let caption = caption.filter(|c| !c.trim().is_empty());
        let id = timeout::bounded(
            self.config.mutation_timeout(),
            self.store
                .create_figure_from_upload(draft_id, storage_ref, alt, caption),
        )
        .await?;
        info!(figure = %id, %storage_ref, "figure created from upload");
        Ok(id)
    }

    /// Replace a figure's image with uploaded bytes.
    ///
    /// Identity, alt text and caption are kept; generation provenance is
    /// cleared.
    ///
    /// # Errors
    /// `UnknownFigure`, `Validation` for empty bytes, or the store failure
    pub async fn replace_with_upload(
        &self,
        figure_id: FigureId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StorageRef, EditorError> {
        let previous = self.require(figure_id).await?;
        let storage_ref = self.upload(bytes, content_type).await?;
        timeout::bounded(
            self.config.mutation_timeout(),
            self.store.replace_figure_image(figure_id, storage_ref, None),
        )
        .await?;
        self.urls.invalidate(&previous.storage_ref).await;
        info!(figure = %figure_id, %storage_ref, "figure image replaced");
        Ok(storage_ref)
    }

    /// Look up a figure
    ///
    /// # Errors
    /// The store failure
    pub async fn fetch(&self, figure_id: FigureId) -> Result<Option<Figure>, EditorError> {
        Ok(timeout::bounded(self.config.mutation_timeout(), self.store.get_figure(figure_id)).await?)
    }

    async fn require(&self, figure_id: FigureId) -> Result<Figure, EditorError> {
        self.fetch(figure_id)
            .await?
            .ok_or(EditorError::UnknownFigure(figure_id))
    }

    /// Block currently showing `figure`.
    ///
    /// The figure's back-reference only counts while that block still points
    /// at the figure; a deleted or relinked block leaves it stale.
    async fn holder(&self, figure: &Figure) -> Result<Option<BlockId>, EditorError> {
        let Some(current) = figure.block_id else {
            return Ok(None);
        };
        let shown = timeout::bounded(
            self.config.mutation_timeout(),
            self.store.figure_for_block(current),
        )
        .await?;
        if shown.is_some_and(|f| f.id == figure.id) {
            Ok(Some(current))
        } else {
            debug!(figure = %figure.id, block = %current, "ignoring stale back-reference");
            Ok(None)
        }
    }

    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<StorageRef, EditorError> {
        if bytes.is_empty() {
            return Err(ContentError::missing("image").into());
        }
        Ok(timeout::bounded(
            self.config.mutation_timeout(),
            self.storage.store(bytes, content_type),
        )
        .await?)
    }

    async fn write_link(&self, block_id: BlockId, figure_id: FigureId) -> Result<(), EditorError> {
        timeout::bounded(
            self.config.mutation_timeout(),
            self.store.link_figure_to_block(block_id, figure_id),
        )
        .await?;
        info!(block = %block_id, figure = %figure_id, "figure linked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_content::{BlockType, ChapterId};
    use pyramid_store::{BatchOp, BlockStore, FailPoint, InsertBlock, MemoryBackend, StoreError};

    async fn setup(config: EditorConfig) -> (Arc<MemoryBackend>, FigureService, [BlockId; 2], FigureId) {
        let backend = Arc::new(MemoryBackend::new());
        let service = FigureService::new(backend.clone(), backend.clone(), config);
        let chapter = ChapterId::new();
        let mut blocks = [BlockId::new(); 2];
        for (i, slot) in blocks.iter_mut().enumerate() {
            *slot = backend
                .insert_block(InsertBlock {
                    chapter_id: chapter,
                    block_type: BlockType::Figure,
                    content: String::new(),
                    order: i as f64,
                    after_block_id: None,
                })
                .await
                .unwrap();
        }
        let figure = service
            .create_from_upload(DraftId::new(), b"png".to_vec(), "image/png", "Overview", None)
            .await
            .unwrap();
        (backend, service, blocks, figure)
    }

    #[tokio::test]
    async fn unlinked_block_shows_placeholder() {
        let (backend, service, blocks, _) = setup(EditorConfig::default()).await;
        let block = backend.block(blocks[0]).unwrap();
        assert_eq!(service.view(&block).await.unwrap(), FigureView::Placeholder);
    }

    #[tokio::test]
    async fn linked_block_shows_figure_and_url() {
        let (backend, service, blocks, figure) = setup(EditorConfig::default()).await;
        service.link(blocks[0], figure).await.unwrap();

        let block = backend.block(blocks[0]).unwrap();
        match service.view(&block).await.unwrap() {
            FigureView::Ready { figure: record, url } => {
                assert_eq!(record.id, figure);
                assert!(url.unwrap().starts_with("memory://images/"));
            }
            FigureView::Placeholder => panic!("expected linked figure"),
        }
    }

    #[tokio::test]
    async fn second_link_rejected_when_enforced() {
        let (_, service, blocks, figure) = setup(EditorConfig::default()).await;
        service.link(blocks[0], figure).await.unwrap();

        let err = service.link(blocks[1], figure).await.unwrap_err();
        assert_eq!(
            err,
            EditorError::FigureAlreadyLinked {
                figure_id: figure,
                block_id: blocks[0]
            }
        );
    }

    #[tokio::test]
    async fn relink_detaches_old_block() {
        let (backend, service, blocks, figure) = setup(EditorConfig::default()).await;
        service.link(blocks[0], figure).await.unwrap();

        let outcome = service.relink(blocks[1], figure).await.unwrap();
        assert_eq!(outcome.detached, Some(blocks[0]));
        assert_eq!(backend.block(blocks[0]).unwrap().figure_id, None);
        assert_eq!(backend.block(blocks[1]).unwrap().figure_id, Some(figure));
    }

    #[tokio::test]
    async fn stale_back_reference_does_not_block_link() {
        let (backend, service, blocks, figure) = setup(EditorConfig::default()).await;
        let mut record = backend.figure(figure).unwrap();
        record.block_id = Some(BlockId::new());
        backend.seed_figure(record);

        service.link(blocks[0], figure).await.unwrap();
        assert_eq!(backend.block(blocks[0]).unwrap().figure_id, Some(figure));
        assert_eq!(backend.figure(figure).unwrap().block_id, Some(blocks[0]));

        let outcome = service.relink(blocks[1], figure).await.unwrap();
        assert_eq!(outcome.detached, Some(blocks[0]));
    }

    #[tokio::test]
    async fn deleted_block_releases_its_figure() {
        let (backend, service, blocks, figure) = setup(EditorConfig::default()).await;
        service.link(blocks[0], figure).await.unwrap();
        let chapter = backend.block(blocks[0]).unwrap().chapter_id;
        backend
            .batch_edit(chapter, vec![BatchOp::delete(blocks[0])])
            .await
            .unwrap();

        let outcome = service.relink(blocks[1], figure).await.unwrap();
        assert_eq!(outcome.detached, None);
        assert_eq!(backend.figure(figure).unwrap().block_id, Some(blocks[1]));
    }

    #[tokio::test]
    async fn reuse_allowed_when_not_enforced() {
        let config = EditorConfig::default().with_one_figure_per_block(false);
        let (backend, service, blocks, figure) = setup(config).await;
        service.link(blocks[0], figure).await.unwrap();
        service.link(blocks[1], figure).await.unwrap();

        assert_eq!(backend.block(blocks[0]).unwrap().figure_id, Some(figure));
        assert_eq!(backend.block(blocks[1]).unwrap().figure_id, Some(figure));
    }

    #[tokio::test]
    async fn replace_keeps_identity_and_text() {
        let (backend, service, _, figure) = setup(EditorConfig::default()).await;
        service
            .update_metadata(
                figure,
                FigureUpdate {
                    caption: Some("Figure 1".into()),
                    ..FigureUpdate::default()
                },
            )
            .await
            .unwrap();

        let new_ref = service
            .replace_with_upload(figure, b"webp".to_vec(), "image/webp")
            .await
            .unwrap();

        let record = backend.figure(figure).unwrap();
        assert_eq!(record.storage_ref, new_ref);
        assert_eq!(record.alt, "Overview");
        assert_eq!(record.caption.as_deref(), Some("Figure 1"));
        assert!(!record.is_generated());
    }

    #[tokio::test]
    async fn invalid_metadata_never_reaches_store() {
        let (backend, service, _, figure) = setup(EditorConfig::default()).await;
        backend.reset_calls();

        let err = service
            .update_metadata(
                figure,
                FigureUpdate {
                    alt: Some("  ".into()),
                    ..FigureUpdate::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EditorError::Validation(_)));
        assert_eq!(backend.calls().figure_writes, 0);
    }

    #[tokio::test]
    async fn failed_storage_creates_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let service = FigureService::new(backend.clone(), backend.clone(), EditorConfig::default());
        backend.fail_next(FailPoint::Upload, StoreError::Backend("quota".into()));
        let draft = DraftId::new();

        let result = service
            .create_from_upload(draft, b"png".to_vec(), "image/png", "alt", None)
            .await;

        assert!(result.is_err());
        assert_eq!(backend.calls().figure_writes, 0);
    }
}
