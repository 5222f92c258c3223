//! Local edit buffer
//!
//! In-memory shadow of one chapter's persisted blocks. Content edits, moves,
//! type changes and deletes stay local until [`EditBuffer::save`] sends them
//! as one batch; inserts persist immediately so the new block has a stable id
//! before anything else touches it.
//!
//! Tracking:
//! - `dirty`: blocks whose current state must be written on save
//! - `deleted`: blocks removed locally
//! - `created`: blocks inserted during this session
//!
//! A created block is only written again if it was edited after creation,
//! and a created block that is deleted again before saving produces no
//! delete.
//!
//! When an insert has to renumber the chapter, the new keys are written with
//! a key-only batch before the insert so the store never sees the new block
//! among keys it does not have.

use crate::error::EditorError;
use indexmap::IndexSet;
use pyramid_content::{ordering, Block, BlockId, BlockType, ChapterId, FigureId};
use pyramid_store::{timeout, BatchOp, BlockStore, InsertBlock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to a remote snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    /// The snapshot replaced the local list
    Applied,
    /// Local edits are pending; the snapshot was ignored
    Deferred,
}

/// Edits captured by [`EditBuffer::prepare_save`].
///
/// Sending does not need the buffer; [`EditBuffer::commit_save`] afterwards
/// clears only what this batch covered, so edits made while it was in
/// flight stay pending.
#[derive(Debug, Clone)]
pub struct PendingSave {
    store: Arc<dyn BlockStore>,
    chapter_id: ChapterId,
    timeout: Duration,
    ops: Vec<BatchOp>,
    created: Vec<BlockId>,
    deleted: Vec<BlockId>,
}

impl PendingSave {
    /// Operations in the batch
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether there is nothing to send
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Send the batch; an empty batch makes no call
    ///
    /// # Errors
    /// The store failure
    pub async fn send(&self) -> Result<(), EditorError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        let count = self.ops.len();
        debug!(chapter = %self.chapter_id, ops = ?self.ops, "sending batch");
        timeout::bounded(
            self.timeout,
            self.store.batch_edit(self.chapter_id, self.ops.clone()),
        )
        .await
        .map_err(|err| {
            warn!(error = %err, chapter = %self.chapter_id, count, "save failed");
            EditorError::from(err)
        })?;
        info!(chapter = %self.chapter_id, count, "chapter saved");
        Ok(())
    }
}

/// In-memory block list with dirty/deleted/created tracking
#[derive(Debug)]
pub struct EditBuffer {
    store: Arc<dyn BlockStore>,
    chapter_id: ChapterId,
    blocks: Vec<Block>,
    dirty: IndexSet<BlockId>,
    deleted: IndexSet<BlockId>,
    created: IndexSet<BlockId>,
    timeout: Duration,
    epsilon: f64,
}

impl EditBuffer {
    /// Empty buffer for a chapter
    #[must_use]
    pub fn new(store: Arc<dyn BlockStore>, chapter_id: ChapterId) -> Self {
        Self {
            store,
            chapter_id,
            blocks: Vec::new(),
            dirty: IndexSet::new(),
            deleted: IndexSet::new(),
            created: IndexSet::new(),
            timeout: Duration::from_secs(10),
            epsilon: ordering::DEFAULT_EPSILON,
        }
    }

    /// With store deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With renumbering threshold
    #[inline]
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Seed from already-persisted blocks (no tracking)
    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.replace_all(blocks);
        self
    }

    /// Chapter being edited
    #[inline]
    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    /// Blocks in document order
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chapter has no blocks
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Position of a block in document order
    #[must_use]
    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Block before `id`
    #[must_use]
    pub fn previous(&self, id: BlockId) -> Option<&Block> {
        let idx = self.index_of(id)?;
        idx.checked_sub(1).map(|i| &self.blocks[i])
    }

    /// Block after `id`
    #[must_use]
    pub fn next(&self, id: BlockId) -> Option<&Block> {
        let idx = self.index_of(id)?;
        self.blocks.get(idx + 1)
    }

    /// Whether `id` will be written on save
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, id: BlockId) -> bool {
        self.dirty.contains(&id)
    }

    /// Whether `id` was inserted during this session
    #[inline]
    #[must_use]
    pub fn is_created(&self, id: BlockId) -> bool {
        self.created.contains(&id)
    }

    /// Whether any edit is waiting for save
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || self.deleted.iter().any(|id| !self.created.contains(id))
    }

    /// Replace a block's content
    ///
    /// # Errors
    /// `UnknownBlock`, or `NotText` for figure blocks
    pub fn change_content(
        &mut self,
        id: BlockId,
        content: impl Into<String>,
    ) -> Result<(), EditorError> {
        let block = self.block_mut(id)?;
        if !block.block_type.is_text() {
            return Err(EditorError::NotText(id));
        }
        block.content = content.into();
        self.dirty.insert(id);
        Ok(())
    }

    /// Change a block's type; switching to a figure drops the text
    ///
    /// # Errors
    /// `UnknownBlock`
    pub fn change_type(&mut self, id: BlockId, block_type: BlockType) -> Result<(), EditorError> {
        let block = self.block_mut(id)?;
        if block.block_type == block_type {
            return Ok(());
        }
        block.block_type = block_type;
        if !block_type.is_text() {
            block.content.clear();
        }
        self.dirty.insert(id);
        Ok(())
    }

    /// Remove a block locally
    ///
    /// # Errors
    /// `UnknownBlock`
    pub fn delete_block(&mut self, id: BlockId) -> Result<Block, EditorError> {
        let idx = self.index_of(id).ok_or(EditorError::UnknownBlock(id))?;
        let block = self.blocks.remove(idx);
        self.dirty.shift_remove(&id);
        self.deleted.insert(id);
        debug!(%id, created = self.created.contains(&id), "block deleted locally");
        Ok(block)
    }

    /// Insert an empty block after `after` (or at the chapter start).
    ///
    /// Persists immediately. On failure the local insert is rolled back.
    ///
    /// # Errors
    /// `UnknownBlock` for a missing neighbour, or the store failure
    pub async fn insert_block(
        &mut self,
        after: Option<BlockId>,
        block_type: BlockType,
    ) -> Result<BlockId, EditorError> {
        self.insert_block_with_content(after, block_type, String::new())
            .await
    }

    /// Insert a block with initial content; see [`Self::insert_block`]
    ///
    /// # Errors
    /// `UnknownBlock` for a missing neighbour, or the store failure
    pub async fn insert_block_with_content(
        &mut self,
        after: Option<BlockId>,
        block_type: BlockType,
        content: impl Into<String>,
    ) -> Result<BlockId, EditorError> {
        let (order, renumbered) = self.place(after, None)?;
        if !renumbered.is_empty() {
            self.persist_keys(&renumbered).await?;
        }
        let provisional = Block::new(self.chapter_id, block_type, content, order);
        let provisional_id = provisional.id;
        let request = InsertBlock {
            chapter_id: self.chapter_id,
            block_type,
            content: provisional.content.clone(),
            order,
            after_block_id: after,
        };
        self.insert_sorted(provisional);

        match timeout::bounded(self.timeout, self.store.insert_block(request)).await {
            Ok(id) => {
                if let Some(block) = self.blocks.iter_mut().find(|b| b.id == provisional_id) {
                    block.id = id;
                }
                self.created.insert(id);
                info!(%id, chapter = %self.chapter_id, order, "block inserted");
                Ok(id)
            }
            Err(err) => {
                self.blocks.retain(|b| b.id != provisional_id);
                warn!(error = %err, chapter = %self.chapter_id, "insert failed, rolled back");
                Err(err.into())
            }
        }
    }

    /// Move a block after `new_after` (or to the chapter start). Local only.
    ///
    /// # Errors
    /// `UnknownBlock` for the block or its new neighbour
    pub fn move_block(&mut self, id: BlockId, new_after: Option<BlockId>) -> Result<(), EditorError> {
        if self.index_of(id).is_none() {
            return Err(EditorError::UnknownBlock(id));
        }
        if new_after == Some(id) {
            return Ok(());
        }
        let (order, renumbered) = self.place(new_after, Some(id))?;
        self.dirty.extend(renumbered.into_iter().map(|(other, _)| other));
        self.block_mut(id)?.order = order;
        ordering::sort_blocks(&mut self.blocks);
        self.dirty.insert(id);
        debug!(%id, order, "block moved");
        Ok(())
    }

    /// Move a block to `index` of the document (clamped). Local only.
    ///
    /// # Errors
    /// `UnknownBlock`
    pub fn move_to_index(&mut self, id: BlockId, index: usize) -> Result<(), EditorError> {
        let current = self.index_of(id).ok_or(EditorError::UnknownBlock(id))?;
        let others: Vec<BlockId> = self
            .blocks
            .iter()
            .map(|b| b.id)
            .filter(|other| *other != id)
            .collect();
        let index = index.min(others.len());
        if index == current {
            return Ok(());
        }
        let new_after = index.checked_sub(1).map(|i| others[i]);
        self.move_block(id, new_after)
    }

    /// Undo an insert from this session, deleting the block from the store
    /// right away
    ///
    /// # Errors
    /// `UnknownBlock` for a block not created in this session, or the store
    /// failure (the block is then kept)
    pub async fn retract(&mut self, id: BlockId) -> Result<(), EditorError> {
        if !self.created.contains(&id) || self.index_of(id).is_none() {
            return Err(EditorError::UnknownBlock(id));
        }
        timeout::bounded(
            self.timeout,
            self.store.batch_edit(self.chapter_id, vec![BatchOp::delete(id)]),
        )
        .await?;
        self.blocks.retain(|b| b.id != id);
        self.dirty.shift_remove(&id);
        self.created.shift_remove(&id);
        info!(%id, chapter = %self.chapter_id, "inserted block retracted");
        Ok(())
    }

    /// Mirror a link already written through the figure store.
    ///
    /// Links are not part of the save batch; this only updates the local
    /// copy.
    ///
    /// # Errors
    /// `UnknownBlock`
    pub fn set_figure_link(
        &mut self,
        id: BlockId,
        figure_id: Option<FigureId>,
    ) -> Result<(), EditorError> {
        self.block_mut(id)?.figure_id = figure_id;
        Ok(())
    }

    /// The batch [`Self::save`] would send
    #[must_use]
    pub fn pending_operations(&self) -> Vec<BatchOp> {
        let updates = self
            .dirty
            .iter()
            .filter_map(|id| self.block(*id))
            .map(BatchOp::update_from);
        let deletes = self
            .deleted
            .iter()
            .filter(|id| !self.created.contains(*id))
            .map(|id| BatchOp::delete(*id));
        updates.chain(deletes).collect()
    }

    /// Send pending edits as one batch.
    ///
    /// Returns the number of operations sent; nothing is sent when there is
    /// nothing to save. On failure all local state is kept for a retry.
    ///
    /// # Errors
    /// The store failure
    pub async fn save(&mut self) -> Result<usize, EditorError> {
        let pending = self.prepare_save();
        pending.send().await?;
        self.commit_save(&pending);
        Ok(pending.len())
    }

    /// Capture the pending batch without sending it
    #[must_use]
    pub fn prepare_save(&self) -> PendingSave {
        PendingSave {
            store: self.store.clone(),
            chapter_id: self.chapter_id,
            timeout: self.timeout,
            ops: self.pending_operations(),
            created: self.created.iter().copied().collect(),
            deleted: self.deleted.iter().copied().collect(),
        }
    }

    /// Clear the tracking a successfully sent batch covered.
    ///
    /// A block edited again after the batch was captured stays dirty.
    pub fn commit_save(&mut self, sent: &PendingSave) {
        for op in &sent.ops {
            let id = op.block_id();
            let unchanged = self
                .block(id)
                .is_some_and(|block| BatchOp::update_from(block) == *op);
            if unchanged {
                self.dirty.shift_remove(&id);
            }
        }
        for id in &sent.deleted {
            self.deleted.shift_remove(id);
        }
        for id in &sent.created {
            self.created.shift_remove(id);
        }
    }

    /// Replace the buffer with the store's blocks, dropping all tracking
    ///
    /// # Errors
    /// The store failure
    pub async fn load(&mut self) -> Result<(), EditorError> {
        let blocks = timeout::bounded(self.timeout, self.store.get_blocks(self.chapter_id)).await?;
        self.replace_all(blocks);
        info!(chapter = %self.chapter_id, blocks = self.blocks.len(), "chapter loaded");
        Ok(())
    }

    /// Deliver a refetched snapshot; ignored while edits are pending
    pub fn apply_remote(&mut self, blocks: Vec<Block>) -> RemoteApply {
        if self.has_pending() {
            debug!(chapter = %self.chapter_id, "remote snapshot deferred");
            return RemoteApply::Deferred;
        }
        self.replace_all(blocks);
        RemoteApply::Applied
    }

    fn replace_all(&mut self, blocks: Vec<Block>) {
        let chapter_id = self.chapter_id;
        self.blocks = blocks
            .into_iter()
            .filter(|b| b.chapter_id == chapter_id)
            .collect();
        ordering::sort_blocks(&mut self.blocks);
        self.clear_tracking();
    }

    fn clear_tracking(&mut self) {
        self.dirty.clear();
        self.deleted.clear();
        self.created.clear();
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, EditorError> {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(EditorError::UnknownBlock(id))
    }

    fn insert_sorted(&mut self, block: Block) {
        let idx = self
            .blocks
            .partition_point(|b| b.order.total_cmp(&block.order).is_le());
        self.blocks.insert(idx, block);
    }

    /// Key for a block landing after `after`, renumbering once on collision.
    ///
    /// Also returns the blocks the renumber rekeyed, with their previous keys.
    fn place(
        &mut self,
        after: Option<BlockId>,
        moving: Option<BlockId>,
    ) -> Result<(f64, Vec<(BlockId, f64)>), EditorError> {
        if let Some(after) = after {
            if self.index_of(after).is_none() {
                return Err(EditorError::UnknownBlock(after));
            }
        }
        let mut renumbered = Vec::new();
        for attempt in 0..2 {
            let (before, next) =
                ordering::neighbours(&self.blocks, after, moving).unwrap_or_default();
            if let Some(key) = ordering::place_between(before, next, self.epsilon).key() {
                return Ok((key, renumbered));
            }
            if attempt == 0 {
                renumbered = self.renumber();
            }
        }
        // Dense integer keys always leave a usable midpoint
        Err(EditorError::Config(format!(
            "renumber_epsilon {} leaves no usable gap",
            self.epsilon
        )))
    }

    fn renumber(&mut self) -> Vec<(BlockId, f64)> {
        let previous: Vec<(BlockId, f64)> = self.blocks.iter().map(|b| (b.id, b.order)).collect();
        let changed = ordering::renumber(&mut self.blocks);
        info!(chapter = %self.chapter_id, changed = changed.len(), "order keys renumbered");
        previous
            .into_iter()
            .filter(|(id, _)| changed.contains(id))
            .collect()
    }

    /// Write renumbered keys now; on failure put the old keys back
    async fn persist_keys(&mut self, previous: &[(BlockId, f64)]) -> Result<(), EditorError> {
        let ops: Vec<BatchOp> = previous
            .iter()
            .filter_map(|(id, _)| self.block(*id))
            .map(|b| BatchOp::reorder(b.id, b.order))
            .collect();
        let sent = timeout::bounded(self.timeout, self.store.batch_edit(self.chapter_id, ops)).await;
        if let Err(err) = sent {
            for (id, order) in previous {
                if let Some(block) = self.blocks.iter_mut().find(|b| b.id == *id) {
                    block.order = *order;
                }
            }
            ordering::sort_blocks(&mut self.blocks);
            warn!(error = %err, chapter = %self.chapter_id, "renumber not persisted, keys restored");
            return Err(err.into());
        }
        debug!(chapter = %self.chapter_id, count = previous.len(), "renumbered keys persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pyramid_store::{FailPoint, MemoryBackend, StoreError};

    fn setup() -> (Arc<MemoryBackend>, EditBuffer) {
        let store = Arc::new(MemoryBackend::new());
        let buffer = EditBuffer::new(store.clone(), ChapterId::new());
        (store, buffer)
    }

    fn contents(buffer: &EditBuffer) -> Vec<&str> {
        buffer.blocks().iter().map(|b| b.content.as_str()).collect()
    }

    #[tokio::test]
    async fn insert_is_immediate_and_tracked_as_created() {
        let (store, mut buffer) = setup();
        let id = buffer
            .insert_block(None, BlockType::Paragraph)
            .await
            .unwrap();

        assert_eq!(store.calls().inserts.len(), 1);
        assert!(buffer.is_created(id));
        assert!(!buffer.is_dirty(id));
        assert!(buffer.pending_operations().is_empty());
        assert_eq!(store.block(id).unwrap().order, 0.0);
    }

    #[tokio::test]
    async fn keys_follow_neighbours() {
        let (_, mut buffer) = setup();
        let a = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        let c = buffer.insert_block(Some(a), BlockType::Paragraph).await.unwrap();
        let b = buffer.insert_block(Some(a), BlockType::Paragraph).await.unwrap();
        let z = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();

        let keys: Vec<(BlockId, f64)> = buffer.blocks().iter().map(|b| (b.id, b.order)).collect();
        assert_eq!(keys, vec![(z, -1.0), (a, 0.0), (b, 0.5), (c, 1.0)]);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back() {
        let (store, mut buffer) = setup();
        store.fail_next(FailPoint::Insert, StoreError::Network("offline".into()));

        let err = buffer
            .insert_block(None, BlockType::Paragraph)
            .await
            .unwrap_err();

        assert!(matches!(err, EditorError::Store(StoreError::Network(_))));
        assert!(buffer.is_empty());
        assert!(!buffer.has_pending());
    }

    #[tokio::test]
    async fn save_twice_sends_once() {
        let (store, mut buffer) = setup();
        let id = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        buffer.change_content(id, "draft text").unwrap();

        assert_eq!(buffer.save().await.unwrap(), 1);
        assert_eq!(buffer.save().await.unwrap(), 0);
        assert_eq!(store.calls().batches.len(), 1);
        assert_eq!(store.block(id).unwrap().content, "draft text");
    }

    #[tokio::test]
    async fn create_edit_delete_only_inserts() {
        let (store, mut buffer) = setup();
        let id = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        buffer.change_content(id, "short-lived").unwrap();
        buffer.delete_block(id).unwrap();

        assert!(buffer.pending_operations().is_empty());
        buffer.save().await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.inserts.len(), 1);
        assert!(calls.batches.is_empty());
        // Nothing deletes it remotely; it stays as an orphan
        assert_eq!(store.block(id).unwrap().content, "");
    }

    #[tokio::test]
    async fn failed_save_keeps_everything() {
        let (store, mut buffer) = setup();
        let keep = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        let gone = buffer.insert_block(Some(keep), BlockType::Code).await.unwrap();
        buffer.save().await.unwrap();
        buffer.change_content(keep, "edited").unwrap();
        buffer.delete_block(gone).unwrap();
        let before = buffer.pending_operations();

        store.fail_next(FailPoint::Batch, StoreError::timeout(Duration::from_secs(10)));
        assert!(buffer.save().await.unwrap_err().is_timeout());

        assert_eq!(buffer.pending_operations(), before);
        assert_eq!(contents(&buffer), vec!["edited"]);

        assert_eq!(buffer.save().await.unwrap(), 2);
        assert_eq!(store.chapter_blocks(buffer.chapter_id()).len(), 1);
    }

    #[tokio::test]
    async fn move_marks_dirty_and_reorders() {
        let (_, mut buffer) = setup();
        let a = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        let b = buffer.insert_block(Some(a), BlockType::Paragraph).await.unwrap();
        let c = buffer.insert_block(Some(b), BlockType::Paragraph).await.unwrap();

        buffer.move_block(c, None).unwrap();
        let ids: Vec<_> = buffer.blocks().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![c, a, b]);
        assert!(buffer.is_dirty(c));

        buffer.move_to_index(c, 2).unwrap();
        let ids: Vec<_> = buffer.blocks().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    fn crowded_chapter() -> (Arc<MemoryBackend>, EditBuffer, BlockId, BlockId) {
        let store = Arc::new(MemoryBackend::new());
        let chapter = ChapterId::new();
        let first = Block::new(chapter, BlockType::Paragraph, "a", 1.0);
        let second = Block::new(chapter, BlockType::Paragraph, "c", 1.0 + f64::EPSILON);
        let (first_id, second_id) = (first.id, second.id);
        store.seed_block(first.clone());
        store.seed_block(second.clone());
        let buffer = EditBuffer::new(store.clone(), chapter).with_blocks(vec![first, second]);
        (store, buffer, first_id, second_id)
    }

    #[tokio::test]
    async fn collision_renumbers_chapter() {
        let (store, mut buffer, first_id, second_id) = crowded_chapter();

        let mid = buffer
            .insert_block_with_content(Some(first_id), BlockType::Paragraph, "b")
            .await
            .unwrap();

        let keys: Vec<(BlockId, f64)> = buffer.blocks().iter().map(|b| (b.id, b.order)).collect();
        assert_eq!(keys, vec![(first_id, 0.0), (mid, 0.5), (second_id, 1.0)]);

        // The store already agrees, before any save
        let persisted: Vec<String> = store
            .chapter_blocks(buffer.chapter_id())
            .into_iter()
            .map(|b| b.content)
            .collect();
        assert_eq!(persisted, vec!["a", "b", "c"]);
        assert!(!buffer.has_pending());
        assert_eq!(
            store.calls().batches[0],
            vec![BatchOp::reorder(first_id, 0.0), BatchOp::reorder(second_id, 1.0)]
        );
    }

    #[tokio::test]
    async fn renumber_keeps_unsaved_text_local() {
        let (store, mut buffer, first_id, _) = crowded_chapter();
        buffer.change_content(first_id, "edited").unwrap();

        buffer
            .insert_block(Some(first_id), BlockType::Paragraph)
            .await
            .unwrap();

        assert_eq!(store.block(first_id).unwrap().content, "a");
        assert_eq!(store.block(first_id).unwrap().order, 0.0);
        assert!(buffer.is_dirty(first_id));
        buffer.save().await.unwrap();
        assert_eq!(store.block(first_id).unwrap().content, "edited");
    }

    #[tokio::test]
    async fn failed_renumber_restores_keys() {
        let (store, mut buffer, first_id, second_id) = crowded_chapter();
        store.fail_next(FailPoint::Batch, StoreError::Network("down".into()));

        let err = buffer
            .insert_block(Some(first_id), BlockType::Paragraph)
            .await
            .unwrap_err();

        assert!(matches!(err, EditorError::Store(StoreError::Network(_))));
        let keys: Vec<(BlockId, f64)> = buffer.blocks().iter().map(|b| (b.id, b.order)).collect();
        assert_eq!(keys, vec![(first_id, 1.0), (second_id, 1.0 + f64::EPSILON)]);
        assert!(store.calls().inserts.is_empty());
        assert!(!buffer.has_pending());
    }

    #[tokio::test]
    async fn retract_deletes_session_insert() {
        let (store, mut buffer) = setup();
        let keep = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        buffer.save().await.unwrap();
        let gone = buffer.insert_block(Some(keep), BlockType::Figure).await.unwrap();

        buffer.retract(gone).await.unwrap();

        assert!(store.block(gone).is_none());
        assert!(buffer.block(gone).is_none());
        assert!(!buffer.has_pending());
        assert_eq!(buffer.retract(keep).await, Err(EditorError::UnknownBlock(keep)));
    }

    #[tokio::test]
    async fn edit_during_save_stays_pending() {
        let (store, mut buffer) = setup();
        let a = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        let b = buffer.insert_block(Some(a), BlockType::Paragraph).await.unwrap();
        buffer.change_content(a, "first").unwrap();
        buffer.change_content(b, "second").unwrap();

        let pending = buffer.prepare_save();
        buffer.change_content(b, "second, revised").unwrap();
        pending.send().await.unwrap();
        buffer.commit_save(&pending);

        assert!(!buffer.is_dirty(a));
        assert!(buffer.is_dirty(b));
        assert_eq!(store.block(b).unwrap().content, "second");
        assert_eq!(buffer.save().await.unwrap(), 1);
        assert_eq!(store.block(b).unwrap().content, "second, revised");
    }

    #[tokio::test]
    async fn remote_snapshot_waits_for_save() {
        let (_, mut buffer) = setup();
        let id = buffer.insert_block(None, BlockType::Paragraph).await.unwrap();
        buffer.change_content(id, "local").unwrap();

        let remote = vec![Block::with_id(id, buffer.chapter_id(), BlockType::Paragraph, "remote", 0.0)];
        assert_eq!(buffer.apply_remote(remote.clone()), RemoteApply::Deferred);
        assert_eq!(contents(&buffer), vec!["local"]);

        buffer.save().await.unwrap();
        assert_eq!(buffer.apply_remote(remote), RemoteApply::Applied);
        assert_eq!(contents(&buffer), vec!["remote"]);
    }

    #[tokio::test]
    async fn figure_blocks_reject_text() {
        let (_, mut buffer) = setup();
        let id = buffer.insert_block(None, BlockType::Figure).await.unwrap();
        assert_eq!(
            buffer.change_content(id, "caption?"),
            Err(EditorError::NotText(id))
        );
    }

    #[tokio::test]
    async fn unknown_neighbour_is_rejected_before_network() {
        let (store, mut buffer) = setup();
        let ghost = BlockId::new();
        let err = buffer
            .insert_block(Some(ghost), BlockType::Paragraph)
            .await
            .unwrap_err();
        assert_eq!(err, EditorError::UnknownBlock(ghost));
        assert_eq!(store.calls().total(), 0);
    }
}
