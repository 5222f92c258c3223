//! Code storage contract and the in-memory code book

use crate::code::{AccessCode, Redemption};
use crate::error::AccessError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where access codes live
#[async_trait]
pub trait CodeStore: Send + Sync + std::fmt::Debug {
    /// Look a code up by its text
    async fn find_code(&self, code: &str) -> Result<Option<AccessCode>, AccessError>;

    /// Count one use of `code` and append `redemption`, atomically.
    ///
    /// Must refuse with [`AccessError::LimitReached`] instead of going past
    /// `max_uses`. Returns the updated code.
    async fn record_redemption(
        &self,
        code: &str,
        redemption: Redemption,
    ) -> Result<AccessCode, AccessError>;
}

/// Serializable set of codes and their redemption history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBook {
    /// Known codes
    #[serde(default)]
    pub codes: Vec<AccessCode>,
    /// Redemption log, oldest first
    #[serde(default)]
    pub redemptions: Vec<Redemption>,
}

impl CodeBook {
    /// Read a code book from a JSON file
    ///
    /// # Errors
    /// `Io` when unreadable, `Json` when malformed
    pub fn load(path: &Path) -> Result<Self, AccessError> {
        let text = std::fs::read_to_string(path).map_err(|e| AccessError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| AccessError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the code book as pretty JSON, replacing the file atomically
    ///
    /// # Errors
    /// `Io` when the file cannot be written
    pub fn save(&self, path: &Path) -> Result<(), AccessError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| AccessError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        crate::client::write_atomic(path, &text)
    }
}

/// Code store over a [`CodeBook`] behind a lock
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    book: Mutex<CodeBook>,
}

impl MemoryCodeStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `book`
    #[must_use]
    pub fn from_book(book: CodeBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }

    /// Add or replace a code
    pub fn upsert(&self, code: AccessCode) {
        let mut book = self.book.lock();
        match book.codes.iter_mut().find(|c| c.code == code.code) {
            Some(existing) => *existing = code,
            None => book.codes.push(code),
        }
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> CodeBook {
        self.book.lock().clone()
    }

    /// Redemptions recorded for `code`
    #[must_use]
    pub fn redemptions_of(&self, code: &str) -> Vec<Redemption> {
        self.book
            .lock()
            .redemptions
            .iter()
            .filter(|r| r.code == code)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn find_code(&self, code: &str) -> Result<Option<AccessCode>, AccessError> {
        Ok(self.book.lock().codes.iter().find(|c| c.code == code).cloned())
    }

    async fn record_redemption(
        &self,
        code: &str,
        redemption: Redemption,
    ) -> Result<AccessCode, AccessError> {
        let mut book = self.book.lock();
        let entry = book
            .codes
            .iter_mut()
            .find(|c| c.code == code)
            .ok_or_else(|| AccessError::UnknownCode(code.to_string()))?;
        if entry.is_exhausted() {
            return Err(AccessError::LimitReached(code.to_string()));
        }
        entry.used_count = entry
            .used_count
            .checked_add(1)
            .ok_or_else(|| AccessError::LimitReached(code.to_string()))?;
        let updated = entry.clone();
        book.redemptions.push(redemption);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn redemption(code: &str) -> Redemption {
        Redemption {
            code: code.into(),
            redeemed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_refuses_past_limit() {
        let store = MemoryCodeStore::new();
        store.upsert(AccessCode::new("ONE").with_max_uses(1));

        let updated = store.record_redemption("ONE", redemption("ONE")).await.unwrap();
        assert_eq!(updated.used_count, 1);

        let err = store
            .record_redemption("ONE", redemption("ONE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::LimitReached(_)));
        assert_eq!(store.redemptions_of("ONE").len(), 1);
    }

    #[tokio::test]
    async fn unlimited_code_stops_at_counter_ceiling() {
        let store = MemoryCodeStore::new();
        let mut code = AccessCode::new("OPEN");
        code.used_count = u32::MAX;
        store.upsert(code);

        let err = store
            .record_redemption("OPEN", redemption("OPEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::LimitReached(_)));
        assert_eq!(store.find_code("OPEN").await.unwrap().unwrap().used_count, u32::MAX);
        assert!(store.redemptions_of("OPEN").is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_by_code() {
        let store = MemoryCodeStore::new();
        store.upsert(AccessCode::new("A"));
        store.upsert(AccessCode::new("A").deactivated());

        let book = store.snapshot();
        assert_eq!(book.codes.len(), 1);
        assert!(!book.codes[0].is_active);
        assert!(store.find_code("B").await.unwrap().is_none());
    }

    #[test]
    fn book_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        let book = CodeBook {
            codes: vec![AccessCode::new("BOOK").with_max_uses(3)],
            redemptions: vec![redemption("BOOK")],
        };

        book.save(&path).unwrap();
        assert_eq!(CodeBook::load(&path).unwrap(), book);
    }

    #[test]
    fn missing_book_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CodeBook::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AccessError::Io { .. }));
        assert!(err.is_retryable());
    }
}
