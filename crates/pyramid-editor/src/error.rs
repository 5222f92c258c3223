//! Error types for the editor core

use pyramid_content::{BlockId, ContentError, FigureId};
use pyramid_store::StoreError;

/// Editor error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    /// Block is not in the chapter buffer
    #[error("unknown block: {0}")]
    UnknownBlock(BlockId),

    /// Operation needs a text block
    #[error("block {0} has no editable text")]
    NotText(BlockId),

    /// Remote collaborator failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Figure already shown by another block
    #[error("figure {figure_id} is already linked to block {block_id}")]
    FigureAlreadyLinked {
        /// Figure being linked
        figure_id: FigureId,
        /// Block currently showing it
        block_id: BlockId,
    },

    /// Figure record does not exist
    #[error("unknown figure: {0}")]
    UnknownFigure(FigureId),

    /// Image generation pipeline failed
    #[error("generation failed: {0}")]
    Generation(String),

    /// Input failed validation
    #[error("invalid input: {0}")]
    Validation(#[from] ContentError),

    /// Image payload could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(String),
}

impl EditorError {
    /// Whether retrying the same action could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::Generation(_) => true,
            _ => false,
        }
    }

    /// Whether this failed on the network deadline
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Store(StoreError::Timeout { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_errors_keep_their_message() {
        let err: EditorError = StoreError::timeout(Duration::from_secs(10)).into();
        assert_eq!(err.to_string(), "operation timed out after 10000ms");
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_not_retryable() {
        let err: EditorError = ContentError::missing("alt").into();
        assert!(!err.is_retryable());
    }
}
