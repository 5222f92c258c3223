//! Access errors
//!
//! Redemption outcomes a reader should see are not errors: they come back
//! as [`crate::RedeemResult`]. These cover infrastructure failures.

use std::path::PathBuf;

/// Infrastructure failure in code or flag storage
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// No such code
    #[error("unknown access code '{0}'")]
    UnknownCode(String),

    /// A concurrent redemption used the last slot
    #[error("usage limit reached for '{0}'")]
    LimitReached(String),

    /// Code store unavailable
    #[error("code store error: {0}")]
    Backend(String),

    /// Filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content is not the expected JSON
    #[error("malformed JSON in {path}: {source}")]
    Json {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// A stored value could not be decoded
    #[error("malformed value under '{key}': {source}")]
    Stored {
        /// Storage key
        key: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl AccessError {
    /// I/O failure at a path
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a user-initiated retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Io { .. })
    }
}
