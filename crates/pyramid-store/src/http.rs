//! HTTP image fetching with reqwest

use crate::error::StoreError;
use crate::traits::ImageFetcher;
use async_trait::async_trait;
use std::time::Duration;

/// Downloads generated images served from remote URLs
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Fetcher whose requests give up after `timeout`
    ///
    /// # Errors
    /// `Backend` if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), StoreError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), %content_type, "fetched remote image");
        Ok((bytes.to_vec(), content_type))
    }
}
