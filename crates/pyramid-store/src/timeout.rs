//! Client-side deadlines for remote calls
//!
//! A call that outlives its deadline is reported as [`StoreError::Timeout`]
//! and is not retried; retries are user-initiated.

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;

/// Run `call`, failing with `Timeout` once `limit` elapses
///
/// # Errors
/// The call's own error, or `Timeout`
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "remote call timed out");
            Err(StoreError::timeout(limit))
        }
    }
}
