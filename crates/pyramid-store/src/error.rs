//! Error types for remote collaborators
//!
//! One taxonomy covers the hosted store, image storage and generation
//! services, so callers can surface any of them the same way.

use std::time::Duration;

/// Failure reported by (or while talking to) an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind
        kind: &'static str,
        /// Record id as text
        id: String,
    },

    /// Caller lacks privilege for a write
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Client-side deadline elapsed
    #[error("operation timed out after {duration_ms}ms")]
    Timeout {
        /// Deadline in milliseconds
        duration_ms: u64,
    },

    /// Write rejected because of conflicting state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Remote service returned an error
    #[error("backend error: {0}")]
    Backend(String),

    /// Payload could not be decoded
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl StoreError {
    /// Not-found shorthand
    #[inline]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Timeout for a deadline
    #[inline]
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether a user-initiated retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout { .. } | Self::Backend(_)
        )
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::InvalidPayload(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Backend(format!("HTTP {status}: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
