//! Markup errors
//!
//! Every error carries the 1-based source line it was found on so that
//! tooling can point authors at the offending spec line.

use pyramid_content::ContentError;

/// Figure-spec and markdown failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    /// A field failed validation
    #[error("line {line}: {source}")]
    Field {
        /// Source line
        line: usize,
        /// Validation failure
        #[source]
        source: ContentError,
    },

    /// A spec line is not `key: value`
    #[error("line {line}: expected `key: value`, found '{text}'")]
    Malformed {
        /// Source line
        line: usize,
        /// Offending text
        text: String,
    },

    /// Key outside the known set
    #[error("line {line}: unknown key '{key}'")]
    UnknownKey {
        /// Source line
        line: usize,
        /// Offending key
        key: String,
    },

    /// Same key twice in one spec
    #[error("line {line}: duplicate key '{key}'")]
    DuplicateKey {
        /// Source line
        line: usize,
        /// Repeated key
        key: String,
    },

    /// Two specs share a figure id
    #[error("line {line}: figure id '{id}' already used on line {first}")]
    DuplicateId {
        /// Line of the second spec
        line: usize,
        /// Repeated id
        id: String,
        /// Line of the first spec
        first: usize,
    },

    /// Frontmatter is not valid chapter metadata
    #[error("line {line}: frontmatter: {message}")]
    Frontmatter {
        /// Source line
        line: usize,
        /// Parser message
        message: String,
    },

    /// No spec with the requested id
    #[error("no figure spec with id '{0}'")]
    NotFound(String),
}

impl MarkupError {
    /// Field failure on a line
    #[inline]
    #[must_use]
    pub fn field(line: usize, source: ContentError) -> Self {
        Self::Field { line, source }
    }

    /// Source line, when the error has one
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Field { line, .. }
            | Self::Malformed { line, .. }
            | Self::UnknownKey { line, .. }
            | Self::DuplicateKey { line, .. }
            | Self::DuplicateId { line, .. }
            | Self::Frontmatter { line, .. } => Some(*line),
            Self::NotFound(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_lead_with_line() {
        let err = MarkupError::field(7, ContentError::missing("prompt"));
        assert_eq!(err.to_string(), "line 7: prompt is required");
        assert_eq!(err.line(), Some(7));
        assert_eq!(MarkupError::NotFound("fig-x".into()).line(), None);
    }
}
