//! In-memory backend
//!
//! Implements every store trait over concurrent maps. Used by tests and the
//! CLI; it also records each call it receives and can be told to fail, which
//! is how network-call counts and failure paths are exercised.

use crate::error::StoreError;
use crate::ops::{BatchOp, InsertBlock};
use crate::traits::{BlockStore, FigureStore, ImageStorage};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use pyramid_content::{
    ordering, Block, BlockId, ChapterId, DraftId, Figure, FigureId, FigureUpdate, NewFigure,
    Provenance, StorageRef,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `insert_block`
    Insert,
    /// `batch_edit`
    Batch,
    /// `get_blocks`
    Load,
    /// Any figure-record write
    FigureWrite,
    /// `ImageStorage::store`
    Upload,
}

/// Calls received, in arrival order per kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    /// Insert requests
    pub inserts: Vec<InsertBlock>,
    /// Batch payloads
    pub batches: Vec<Vec<BatchOp>>,
    /// `get_blocks` calls
    pub loads: usize,
    /// Figure-record writes
    pub figure_writes: usize,
    /// Image uploads
    pub uploads: usize,
}

impl CallLog {
    /// Total number of network-visible calls
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserts.len() + self.batches.len() + self.loads + self.figure_writes + self.uploads
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    once: HashMap<FailPoint, StoreError>,
    always: HashMap<FailPoint, StoreError>,
}

/// Concurrent in-memory store
#[derive(Debug)]
pub struct MemoryBackend {
    blocks: DashMap<BlockId, Block>,
    figures: DashMap<FigureId, Figure>,
    images: DashMap<StorageRef, (Vec<u8>, String)>,
    failures: Mutex<FailurePlan>,
    log: Mutex<CallLog>,
    latency: Mutex<Option<Duration>>,
    read_only: AtomicBool,
    base_url: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: DashMap::new(),
            figures: DashMap::new(),
            images: DashMap::new(),
            failures: Mutex::new(FailurePlan::default()),
            log: Mutex::new(CallLog::default()),
            latency: Mutex::new(None),
            read_only: AtomicBool::new(false),
            base_url: "memory://images".to_string(),
        }
    }

    /// Use a different URL prefix for stored images
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fail the next call at `point` with `error`
    pub fn fail_next(&self, point: FailPoint, error: StoreError) {
        self.failures.lock().once.insert(point, error);
    }

    /// Fail every call at `point` until [`Self::clear_failures`]
    pub fn fail_always(&self, point: FailPoint, error: StoreError) {
        self.failures.lock().always.insert(point, error);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut plan = self.failures.lock();
        plan.once.clear();
        plan.always.clear();
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Reject all writes with `Unauthorized`
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Snapshot of calls received so far
    #[must_use]
    pub fn calls(&self) -> CallLog {
        self.log.lock().clone()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        *self.log.lock() = CallLog::default();
    }

    /// Insert a block directly, bypassing the call log
    pub fn seed_block(&self, block: Block) {
        self.blocks.insert(block.id, block);
    }

    /// Insert a figure directly, bypassing the call log
    pub fn seed_figure(&self, figure: Figure) {
        self.figures.insert(figure.id, figure);
    }

    /// Stored block
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<Block> {
        self.blocks.get(&id).map(|b| b.clone())
    }

    /// Stored figure
    #[must_use]
    pub fn figure(&self, id: FigureId) -> Option<Figure> {
        self.figures.get(&id).map(|f| f.clone())
    }

    /// Stored blocks of a chapter in document order
    #[must_use]
    pub fn chapter_blocks(&self, chapter_id: ChapterId) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.chapter_id == chapter_id)
            .map(|b| b.clone())
            .collect();
        ordering::sort_blocks(&mut blocks);
        blocks
    }

    /// Stored image bytes
    #[must_use]
    pub fn image(&self, storage_ref: StorageRef) -> Option<Vec<u8>> {
        self.images.get(&storage_ref).map(|e| e.0.clone())
    }

    async fn enter(&self, point: Option<FailPoint>) -> Result<(), StoreError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let Some(point) = point else {
            return Ok(());
        };
        let mut plan = self.failures.lock();
        if let Some(err) = plan.once.remove(&point) {
            return Err(err);
        }
        if let Some(err) = plan.always.get(&point) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthorized("store is read-only".into()));
        }
        Ok(())
    }

    fn figure_mut(
        &self,
        figure_id: FigureId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, FigureId, Figure>, StoreError> {
        self.figures
            .get_mut(&figure_id)
            .ok_or_else(|| StoreError::not_found("figure", figure_id))
    }
}

#[async_trait]
impl BlockStore for MemoryBackend {
    async fn insert_block(&self, request: InsertBlock) -> Result<BlockId, StoreError> {
        self.log.lock().inserts.push(request.clone());
        self.enter(Some(FailPoint::Insert)).await?;
        self.check_writable()?;

        if let Some(after) = request.after_block_id {
            if !self.blocks.contains_key(&after) {
                return Err(StoreError::not_found("block", after));
            }
        }

        let block = Block::new(
            request.chapter_id,
            request.block_type,
            request.content,
            request.order,
        );
        let id = block.id;
        self.blocks.insert(id, block);
        tracing::debug!(%id, chapter = %request.chapter_id, order = request.order, "block inserted");
        Ok(id)
    }

    async fn batch_edit(
        &self,
        chapter_id: ChapterId,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        self.log.lock().batches.push(ops.clone());
        self.enter(Some(FailPoint::Batch)).await?;
        self.check_writable()?;

        // Validate everything first so a bad op leaves the store untouched
        for op in &ops {
            match self.blocks.get(&op.block_id()) {
                Some(block) if block.chapter_id != chapter_id => {
                    return Err(StoreError::Conflict(format!(
                        "block {} belongs to another chapter",
                        op.block_id()
                    )));
                }
                None if !op.is_delete() => {
                    return Err(StoreError::not_found("block", op.block_id()));
                }
                _ => {}
            }
        }

        for op in ops {
            match op {
                BatchOp::Update {
                    block_id,
                    content,
                    block_type,
                    order,
                } => {
                    if let Some(mut block) = self.blocks.get_mut(&block_id) {
                        block.block_type = block_type;
                        block.content = if block_type.is_text() {
                            content
                        } else {
                            String::new()
                        };
                        block.order = order;
                    }
                }
                BatchOp::Reorder { block_id, order } => {
                    if let Some(mut block) = self.blocks.get_mut(&block_id) {
                        block.order = order;
                    }
                }
                BatchOp::Delete { block_id } => {
                    let removed = self.blocks.remove(&block_id).and_then(|(_, b)| b.figure_id);
                    if let Some(figure_id) = removed {
                        if let Some(mut figure) = self.figures.get_mut(&figure_id) {
                            if figure.block_id == Some(block_id) {
                                figure.block_id = None;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_blocks(&self, chapter_id: ChapterId) -> Result<Vec<Block>, StoreError> {
        self.log.lock().loads += 1;
        self.enter(Some(FailPoint::Load)).await?;
        Ok(self
            .blocks
            .iter()
            .filter(|b| b.chapter_id == chapter_id)
            .map(|b| b.clone())
            .collect())
    }
}

#[async_trait]
impl FigureStore for MemoryBackend {
    async fn create_figure(
        &self,
        draft_id: DraftId,
        figure: NewFigure,
    ) -> Result<FigureId, StoreError> {
        self.log.lock().figure_writes += 1;
        self.enter(Some(FailPoint::FigureWrite)).await?;
        self.check_writable()?;
        figure
            .validate()
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;

        let record = Figure::from_new(draft_id, figure);
        let id = record.id;
        self.figures.insert(id, record);
        Ok(id)
    }

    async fn replace_figure_image(
        &self,
        figure_id: FigureId,
        storage_ref: StorageRef,
        provenance: Option<Provenance>,
    ) -> Result<(), StoreError> {
        self.log.lock().figure_writes += 1;
        self.enter(Some(FailPoint::FigureWrite)).await?;
        self.check_writable()?;
        self.figure_mut(figure_id)?
            .replace_image(storage_ref, provenance);
        Ok(())
    }

    async fn update_figure(
        &self,
        figure_id: FigureId,
        update: FigureUpdate,
    ) -> Result<(), StoreError> {
        self.log.lock().figure_writes += 1;
        self.enter(Some(FailPoint::FigureWrite)).await?;
        self.check_writable()?;
        update
            .validate()
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
        update.apply(&mut *self.figure_mut(figure_id)?);
        Ok(())
    }

    async fn link_figure_to_block(
        &self,
        block_id: BlockId,
        figure_id: FigureId,
    ) -> Result<(), StoreError> {
        self.log.lock().figure_writes += 1;
        self.enter(Some(FailPoint::FigureWrite)).await?;
        self.check_writable()?;

        if !self.figures.contains_key(&figure_id) {
            return Err(StoreError::not_found("figure", figure_id));
        }
        let previous = {
            let mut block = self
                .blocks
                .get_mut(&block_id)
                .ok_or_else(|| StoreError::not_found("block", block_id))?;
            block.figure_id.replace(figure_id)
        };
        if let Some(previous) = previous.filter(|p| *p != figure_id) {
            if let Some(mut old) = self.figures.get_mut(&previous) {
                if old.block_id == Some(block_id) {
                    old.block_id = None;
                }
            }
        }
        self.figure_mut(figure_id)?.block_id = Some(block_id);
        Ok(())
    }

    async fn unlink_figure(&self, block_id: BlockId) -> Result<(), StoreError> {
        self.log.lock().figure_writes += 1;
        self.enter(Some(FailPoint::FigureWrite)).await?;
        self.check_writable()?;

        let previous = self
            .blocks
            .get_mut(&block_id)
            .ok_or_else(|| StoreError::not_found("block", block_id))?
            .figure_id
            .take();
        if let Some(previous) = previous {
            if let Some(mut figure) = self.figures.get_mut(&previous) {
                if figure.block_id == Some(block_id) {
                    figure.block_id = None;
                }
            }
        }
        Ok(())
    }

    async fn get_figure(&self, figure_id: FigureId) -> Result<Option<Figure>, StoreError> {
        self.enter(None).await?;
        Ok(self.figure(figure_id))
    }

    async fn figure_for_block(&self, block_id: BlockId) -> Result<Option<Figure>, StoreError> {
        self.enter(None).await?;
        let figure_id = self.blocks.get(&block_id).and_then(|b| b.figure_id);
        Ok(figure_id.and_then(|id| self.figure(id)))
    }

    async fn figures_for_draft(&self, draft_id: DraftId) -> Result<Vec<Figure>, StoreError> {
        self.enter(None).await?;
        let mut figures: Vec<Figure> = self
            .figures
            .iter()
            .filter(|f| f.draft_id == draft_id)
            .map(|f| f.clone())
            .collect();
        figures.sort_by(|a, b| a.figure_key.cmp(&b.figure_key));
        Ok(figures)
    }

    async fn get_figure_url(&self, storage_ref: StorageRef) -> Result<Option<String>, StoreError> {
        self.enter(None).await?;
        Ok(self
            .images
            .contains_key(&storage_ref)
            .then(|| format!("{}/{}", self.base_url, storage_ref)))
    }
}

#[async_trait]
impl ImageStorage for MemoryBackend {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<StorageRef, StoreError> {
        self.log.lock().uploads += 1;
        self.enter(Some(FailPoint::Upload)).await?;
        self.check_writable()?;
        if bytes.is_empty() {
            return Err(StoreError::InvalidPayload("empty upload".into()));
        }
        let storage_ref = StorageRef::compute(&bytes);
        self.images
            .insert(storage_ref, (bytes, content_type.to_string()));
        Ok(storage_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_content::{BlockType, FigureKey};

    fn insert(chapter: ChapterId, order: f64) -> InsertBlock {
        InsertBlock {
            chapter_id: chapter,
            block_type: BlockType::Paragraph,
            content: String::new(),
            order,
            after_block_id: None,
        }
    }

    #[tokio::test]
    async fn insert_then_load() {
        let backend = MemoryBackend::new();
        let chapter = ChapterId::new();
        let a = backend.insert_block(insert(chapter, 1.0)).await.unwrap();
        let b = backend.insert_block(insert(chapter, 0.0)).await.unwrap();

        let ids: Vec<_> = backend.chapter_blocks(chapter).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(backend.get_blocks(chapter).await.unwrap().len(), 2);
        assert_eq!(backend.calls().inserts.len(), 2);
        assert_eq!(backend.calls().loads, 1);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let backend = MemoryBackend::new();
        let chapter = ChapterId::new();
        let id = backend.insert_block(insert(chapter, 0.0)).await.unwrap();

        let result = backend
            .batch_edit(
                chapter,
                vec![
                    BatchOp::Update {
                        block_id: id,
                        content: "changed".into(),
                        block_type: BlockType::Paragraph,
                        order: 0.0,
                    },
                    BatchOp::Update {
                        block_id: BlockId::new(),
                        content: "ghost".into(),
                        block_type: BlockType::Paragraph,
                        order: 1.0,
                    },
                ],
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(backend.block(id).unwrap().content, "");
    }

    #[tokio::test]
    async fn batch_rejects_foreign_chapter() {
        let backend = MemoryBackend::new();
        let id = backend
            .insert_block(insert(ChapterId::new(), 0.0))
            .await
            .unwrap();
        let result = backend
            .batch_edit(ChapterId::new(), vec![BatchOp::delete(id)])
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(FailPoint::Insert, StoreError::Network("down".into()));
        let chapter = ChapterId::new();

        assert!(backend.insert_block(insert(chapter, 0.0)).await.is_err());
        assert!(backend.insert_block(insert(chapter, 0.0)).await.is_ok());
        assert_eq!(backend.chapter_blocks(chapter).len(), 1);
    }

    #[tokio::test]
    async fn read_only_fails_closed() {
        let backend = MemoryBackend::new();
        backend.set_read_only(true);
        let result = backend.insert_block(insert(ChapterId::new(), 0.0)).await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn link_moves_back_reference() {
        let backend = MemoryBackend::new();
        let chapter = ChapterId::new();
        let draft = DraftId::new();
        let block = backend.insert_block(insert(chapter, 0.0)).await.unwrap();

        let storage = backend.store(b"img".to_vec(), "image/png").await.unwrap();
        let first = backend
            .create_figure_from_upload(draft, storage, "first".into(), None)
            .await
            .unwrap();
        let second = backend
            .create_figure(
                draft,
                NewFigure {
                    figure_key: FigureKey::parse("fig-second").unwrap(),
                    storage_ref: storage,
                    alt: "second".into(),
                    caption: None,
                    provenance: None,
                },
            )
            .await
            .unwrap();

        backend.link_figure_to_block(block, first).await.unwrap();
        backend.link_figure_to_block(block, second).await.unwrap();

        assert_eq!(backend.block(block).unwrap().figure_id, Some(second));
        assert_eq!(backend.figure(first).unwrap().block_id, None);
        assert_eq!(backend.figure(second).unwrap().block_id, Some(block));

        let linked = backend.figure_for_block(block).await.unwrap().unwrap();
        assert_eq!(linked.id, second);

        backend.unlink_figure(block).await.unwrap();
        assert_eq!(backend.block(block).unwrap().figure_id, None);
        assert_eq!(backend.figure(second).unwrap().block_id, None);
    }

    #[tokio::test]
    async fn update_figure_edits_record() {
        let backend = MemoryBackend::new();
        let storage = backend.store(b"img".to_vec(), "image/png").await.unwrap();
        let id = backend
            .create_figure_from_upload(DraftId::new(), storage, "old".into(), Some("cap".into()))
            .await
            .unwrap();

        backend
            .update_figure(
                id,
                FigureUpdate {
                    alt: Some(" Pyramid ".into()),
                    caption: Some(String::new()),
                    figure_key: Some(FigureKey::parse("fig-pyramid").unwrap()),
                },
            )
            .await
            .unwrap();

        let figure = backend.figure(id).unwrap();
        assert_eq!(figure.alt, "Pyramid");
        assert_eq!(figure.caption, None);
        assert_eq!(figure.figure_key.as_str(), "fig-pyramid");

        let missing = backend
            .update_figure(FigureId::new(), FigureUpdate::default())
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn deleting_block_frees_its_figure() {
        let backend = MemoryBackend::new();
        let chapter = ChapterId::new();
        let block = backend.insert_block(insert(chapter, 0.0)).await.unwrap();
        let storage = backend.store(b"img".to_vec(), "image/png").await.unwrap();
        let figure = backend
            .create_figure_from_upload(DraftId::new(), storage, "alt".into(), None)
            .await
            .unwrap();
        backend.link_figure_to_block(block, figure).await.unwrap();

        backend
            .batch_edit(chapter, vec![BatchOp::delete(block)])
            .await
            .unwrap();

        assert!(backend.block(block).is_none());
        assert_eq!(backend.figure(figure).unwrap().block_id, None);
    }

    #[tokio::test]
    async fn upload_key_and_url() {
        let backend = MemoryBackend::new().with_base_url("https://files.test");
        let storage = backend.store(b"bytes".to_vec(), "image/webp").await.unwrap();
        let id = backend
            .create_figure_from_upload(DraftId::new(), storage, "alt".into(), Some("cap".into()))
            .await
            .unwrap();

        let figure = backend.figure(id).unwrap();
        assert!(figure.figure_key.as_str().starts_with("upload-"));
        assert_eq!(figure.caption.as_deref(), Some("cap"));

        let url = backend.get_figure_url(storage).await.unwrap().unwrap();
        assert_eq!(url, format!("https://files.test/{storage}"));
        assert_eq!(
            backend
                .get_figure_url(StorageRef::compute(b"missing"))
                .await
                .unwrap(),
            None
        );
    }
}
