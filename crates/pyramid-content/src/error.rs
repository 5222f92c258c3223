//! Content validation errors

/// Rejections raised before anything reaches a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// A required field is missing or blank
    #[error("{field} is required")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// Figure key does not match `[a-z0-9][a-z0-9-]*`
    #[error("invalid figure id '{0}': use lowercase letters, digits and hyphens")]
    InvalidFigureKey(String),

    /// Unknown enum value in a text field
    #[error("unknown {field} '{value}'")]
    UnknownValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Dimensions must be positive
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

impl ContentError {
    /// Missing-field shorthand
    #[inline]
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Unknown-value shorthand
    #[inline]
    pub fn unknown(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            field,
            value: value.into(),
        }
    }

    /// Name of the offending field, for inline error placement
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::UnknownValue { field, .. } => field,
            Self::InvalidFigureKey(_) => "id",
            Self::InvalidDimensions { .. } => "dimensions",
        }
    }
}
