//! Record identifiers
//!
//! Every persisted record is addressed by a ULID newtype so that ids sort by
//! creation time and cannot be mixed up across record kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error parsing an identifier from text
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} id '{value}': {source}")]
pub struct IdError {
    /// Record kind being parsed
    pub kind: &'static str,
    /// Offending input
    pub value: String,
    #[source]
    source: ulid::DecodeError,
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self).map_err(|source| IdError {
                    kind: $kind,
                    value: s.to_string(),
                    source,
                })
            }
        }
    };
}

record_id!(
    /// Draft (ebook version) identifier
    DraftId,
    "draft"
);
record_id!(
    /// Chapter identifier
    ChapterId,
    "chapter"
);
record_id!(
    /// Part (chapter grouping) identifier
    PartId,
    "part"
);
record_id!(
    /// Block identifier
    BlockId,
    "block"
);
record_id!(
    /// Figure record identifier (storage-side, distinct from [`crate::FigureKey`])
    FigureId,
    "figure"
);
