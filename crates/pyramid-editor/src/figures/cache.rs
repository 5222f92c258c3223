//! Figure URL cache using moka
//!
//! Public URLs for stored images are stable per storage reference, so they
//! are resolved once and kept until evicted.

use moka::future::Cache;
use pyramid_content::StorageRef;
use pyramid_store::{FigureStore, StoreError};
use std::time::Duration;

/// Storage reference → public URL
#[derive(Debug, Clone)]
pub struct FigureUrlCache {
    inner: Cache<StorageRef, String>,
}

impl FigureUrlCache {
    /// Cache holding at most `max_capacity` URLs
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Cache whose entries also expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached URL
    pub async fn get(&self, storage_ref: &StorageRef) -> Option<String> {
        self.inner.get(storage_ref).await
    }

    /// Remember a URL
    pub async fn insert(&self, storage_ref: StorageRef, url: String) {
        self.inner.insert(storage_ref, url).await;
    }

    /// Forget a URL
    pub async fn invalidate(&self, storage_ref: &StorageRef) {
        self.inner.invalidate(storage_ref).await;
    }

    /// Cached URL, or ask the store and remember a hit.
    ///
    /// Misses are not cached; the bytes may appear later.
    ///
    /// # Errors
    /// The store failure
    pub async fn resolve(
        &self,
        store: &dyn FigureStore,
        storage_ref: StorageRef,
    ) -> Result<Option<String>, StoreError> {
        if let Some(url) = self.get(&storage_ref).await {
            return Ok(Some(url));
        }
        let url = store.get_figure_url(storage_ref).await?;
        if let Some(url) = &url {
            self.insert(storage_ref, url.clone()).await;
        }
        Ok(url)
    }
}
