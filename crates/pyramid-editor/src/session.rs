//! Chapter editing session
//!
//! Owns the edit buffer for one open chapter. Saves are gated so a second
//! save while one is in flight returns immediately, and failures land in a
//! dismissible banner instead of discarding edits.

use crate::buffer::{EditBuffer, RemoteApply};
use crate::config::EditorConfig;
use crate::error::EditorError;
use parking_lot::Mutex;
use pyramid_content::{Block, ChapterId};
use pyramid_store::BlockStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Batch sent; carries the number of operations
    Saved(usize),
    /// Nothing to send
    NothingToSave,
    /// Another save is running
    InFlight,
}

/// One open chapter
#[derive(Debug)]
pub struct ChapterSession {
    buffer: AsyncMutex<EditBuffer>,
    saving: AtomicBool,
    last_error: Mutex<Option<EditorError>>,
}

struct SavingFlag<'a>(&'a AtomicBool);

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ChapterSession {
    /// Wrap a prepared buffer
    #[must_use]
    pub fn new(buffer: EditBuffer) -> Self {
        Self {
            buffer: AsyncMutex::new(buffer),
            saving: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    /// Open a chapter and load its blocks
    ///
    /// # Errors
    /// The store failure from the initial load
    pub async fn open(
        store: Arc<dyn BlockStore>,
        chapter_id: ChapterId,
        config: &EditorConfig,
    ) -> Result<Self, EditorError> {
        let mut buffer = EditBuffer::new(store, chapter_id)
            .with_timeout(config.mutation_timeout())
            .with_epsilon(config.renumber_epsilon);
        buffer.load().await?;
        Ok(Self::new(buffer))
    }

    /// Exclusive access to the buffer
    pub async fn buffer(&self) -> MutexGuard<'_, EditBuffer> {
        self.buffer.lock().await
    }

    /// Snapshot of the blocks in document order
    pub async fn blocks(&self) -> Vec<Block> {
        self.buffer.lock().await.blocks().to_vec()
    }

    /// Whether a save is running
    #[inline]
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Error currently shown in the banner
    #[must_use]
    pub fn last_error(&self) -> Option<EditorError> {
        self.last_error.lock().clone()
    }

    /// Dismiss the banner
    pub fn dismiss_error(&self) {
        self.last_error.lock().take();
    }

    /// Show `err` in the banner
    pub fn report(&self, err: EditorError) {
        tracing::warn!(error = %err, "editor action failed");
        *self.last_error.lock() = Some(err);
    }

    /// Record the result of an action; errors go to the banner
    pub fn track<T>(&self, result: Result<T, EditorError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// Save pending edits.
    ///
    /// The buffer is only locked to capture and later commit the batch, so
    /// editing continues while it is in flight; edits made meanwhile stay
    /// pending. A failed save keeps every edit and shows the error; the
    /// caller retries.
    ///
    /// # Errors
    /// The store failure, also recorded as [`Self::last_error`]
    pub async fn save(&self) -> Result<SaveOutcome, EditorError> {
        if self.saving.swap(true, Ordering::SeqCst) {
            return Ok(SaveOutcome::InFlight);
        }
        let _flag = SavingFlag(&self.saving);

        let pending = self.buffer.lock().await.prepare_save();
        if let Err(err) = pending.send().await {
            self.report(err.clone());
            return Err(err);
        }
        self.buffer.lock().await.commit_save(&pending);

        if pending.is_empty() {
            Ok(SaveOutcome::NothingToSave)
        } else {
            self.dismiss_error();
            Ok(SaveOutcome::Saved(pending.len()))
        }
    }

    /// Refetch from the store and apply unless edits are pending
    ///
    /// # Errors
    /// The store failure
    pub async fn refresh(&self) -> Result<RemoteApply, EditorError> {
        let mut buffer = self.buffer.lock().await;
        if buffer.has_pending() {
            return Ok(RemoteApply::Deferred);
        }
        buffer.load().await?;
        Ok(RemoteApply::Applied)
    }
}
