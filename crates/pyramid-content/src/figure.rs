//! Figures: image assets referenced by figure blocks
//!
//! A figure is owned by its draft, not by a block. Blocks point at figures
//! through [`crate::Block::figure_id`]; deleting a figure never removes blocks.

use crate::error::ContentError;
use crate::ids::{BlockId, DraftId, FigureId};
use crate::storage::StorageRef;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static FIGURE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("static figure key pattern"));

/// Stable, human-authored figure identifier (e.g. `fig-pyramid-overview`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FigureKey(String);

impl FigureKey {
    /// Validate and wrap a figure key
    ///
    /// # Errors
    /// `MissingField` for blank input, `InvalidFigureKey` for bad characters
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ContentError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ContentError::missing("id"));
        }
        if !FIGURE_KEY_RE.is_match(value) {
            return Err(ContentError::InvalidFigureKey(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Key text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FigureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FigureKey {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FigureKey> for String {
    fn from(key: FigureKey) -> Self {
        key.0
    }
}

/// Visual style preset applied when enhancing generation prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureStyle {
    /// House style for framework diagrams
    #[default]
    Pyramid,
    /// Clean technical diagram
    Diagram,
    /// Hand-drawn sketch
    Sketch,
    /// Photographic illustration
    Photo,
}

impl FigureStyle {
    /// Style tag as written in figure specs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pyramid => "pyramid",
            Self::Diagram => "diagram",
            Self::Sketch => "sketch",
            Self::Photo => "photo",
        }
    }

    /// Template text appended to a prompt when no LLM rewrite is available
    #[must_use]
    pub fn prompt_suffix(&self) -> &'static str {
        match self {
            Self::Pyramid => {
                "Flat vector illustration, layered pyramid motif, muted navy and amber palette, \
                 generous whitespace, no text"
            }
            Self::Diagram => {
                "Minimal technical diagram, thin consistent strokes, white background, \
                 clear labels, no decoration"
            }
            Self::Sketch => "Loose pencil sketch on off-white paper, visible construction lines",
            Self::Photo => "Natural-light editorial photograph, shallow depth of field",
        }
    }

    /// Prompt with this style's template appended
    #[must_use]
    pub fn apply(&self, prompt: &str) -> String {
        format!("{}. {}.", prompt.trim().trim_end_matches('.'), self.prompt_suffix())
    }
}

impl fmt::Display for FigureStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FigureStyle {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pyramid" => Ok(Self::Pyramid),
            "diagram" => Ok(Self::Diagram),
            "sketch" => Ok(Self::Sketch),
            "photo" => Ok(Self::Photo),
            other => Err(ContentError::unknown("style", other)),
        }
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1
    #[serde(rename = "1:1")]
    Square,
    /// 4:3
    #[default]
    #[serde(rename = "4:3")]
    Landscape,
    /// 3:4
    #[serde(rename = "3:4")]
    Portrait,
    /// 16:9
    #[serde(rename = "16:9")]
    Wide,
    /// 9:16
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    /// Ratio as `w:h`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "4:3",
            Self::Portrait => "3:4",
            Self::Wide => "16:9",
            Self::Tall => "9:16",
        }
    }

    /// Width and height parts
    #[must_use]
    pub fn parts(&self) -> (u32, u32) {
        match self {
            Self::Square => (1, 1),
            Self::Landscape => (4, 3),
            Self::Portrait => (3, 4),
            Self::Wide => (16, 9),
            Self::Tall => (9, 16),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "4:3" => Ok(Self::Landscape),
            "3:4" => Ok(Self::Portrait),
            "16:9" => Ok(Self::Wide),
            "9:16" => Ok(Self::Tall),
            other => Err(ContentError::unknown("aspect_ratio", other)),
        }
    }
}

/// Output resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// ~1024px long edge
    #[default]
    #[serde(rename = "1K")]
    OneK,
    /// ~2048px long edge
    #[serde(rename = "2K")]
    TwoK,
    /// ~4096px long edge
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    /// Tier label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }

    /// Long edge in pixels
    #[must_use]
    pub fn long_edge(&self) -> u32 {
        match self {
            Self::OneK => 1024,
            Self::TwoK => 2048,
            Self::FourK => 4096,
        }
    }

    /// Expected pixel dimensions for an aspect ratio
    #[must_use]
    pub fn dimensions(&self, ratio: AspectRatio) -> (u32, u32) {
        let (w, h) = ratio.parts();
        let edge = self.long_edge();
        if w >= h {
            (edge, edge * h / w)
        } else {
            (edge * w / h, edge)
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::OneK),
            "2K" => Ok(Self::TwoK),
            "4K" => Ok(Self::FourK),
            other => Err(ContentError::unknown("resolution", other)),
        }
    }
}

/// How a generated image came to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Prompt as authored
    pub original_prompt: String,
    /// Prompt actually sent to the generator
    pub enhanced_prompt: String,
    /// Style preset
    pub style: FigureStyle,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
}

impl Provenance {
    /// Reject zero dimensions and blank prompts
    ///
    /// # Errors
    /// Returns the first failing field
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.original_prompt.trim().is_empty() {
            return Err(ContentError::missing("prompt"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ContentError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// A stored figure record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    /// Record id
    pub id: FigureId,
    /// Owning draft
    pub draft_id: DraftId,
    /// Authored identifier
    pub figure_key: FigureKey,
    /// Image bytes location
    pub storage_ref: StorageRef,
    /// Alt text
    pub alt: String,
    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Generation provenance; absent for raw uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// Back-reference to the block showing this figure (lookup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<BlockId>,
}

impl Figure {
    /// Create an unlinked figure record
    #[must_use]
    pub fn new(
        draft_id: DraftId,
        figure_key: FigureKey,
        storage_ref: StorageRef,
        alt: impl Into<String>,
    ) -> Self {
        Self {
            id: FigureId::new(),
            draft_id,
            figure_key,
            storage_ref,
            alt: alt.into(),
            caption: None,
            provenance: None,
            block_id: None,
        }
    }

    /// Build a record from validated creation input
    #[must_use]
    pub fn from_new(draft_id: DraftId, new: NewFigure) -> Self {
        Self {
            id: FigureId::new(),
            draft_id,
            figure_key: new.figure_key,
            storage_ref: new.storage_ref,
            alt: new.alt,
            caption: new.caption,
            provenance: new.provenance,
            block_id: None,
        }
    }

    /// Whether the image came from a generation call
    #[inline]
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.provenance.is_some()
    }

    /// Swap the image, keeping identity, alt text and caption.
    ///
    /// Provenance is replaced when the new image was generated; a raw upload
    /// clears it since the old prompt no longer describes the image.
    pub fn replace_image(&mut self, storage_ref: StorageRef, provenance: Option<Provenance>) {
        self.storage_ref = storage_ref;
        self.provenance = provenance;
    }
}

/// Input for creating a figure record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFigure {
    /// Authored identifier
    pub figure_key: FigureKey,
    /// Stored image
    pub storage_ref: StorageRef,
    /// Alt text
    pub alt: String,
    /// Optional caption
    #[serde(default)]
    pub caption: Option<String>,
    /// Generation provenance
    #[serde(default)]
    pub provenance: Option<Provenance>,
}

impl NewFigure {
    /// Check required fields
    ///
    /// # Errors
    /// `MissingField("alt")` for blank alt text, or a provenance failure
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.alt.trim().is_empty() {
            return Err(ContentError::missing("alt"));
        }
        if let Some(provenance) = &self.provenance {
            provenance.validate()?;
        }
        Ok(())
    }
}

/// Closed set of editable figure fields
///
/// `None` leaves a field untouched. An empty caption clears the caption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FigureUpdate {
    /// New alt text
    #[serde(default)]
    pub alt: Option<String>,
    /// New caption; empty string clears
    #[serde(default)]
    pub caption: Option<String>,
    /// New authored identifier
    #[serde(default)]
    pub figure_key: Option<FigureKey>,
}

impl FigureUpdate {
    /// Whether the update changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alt.is_none() && self.caption.is_none() && self.figure_key.is_none()
    }

    /// Check field values
    ///
    /// # Errors
    /// `MissingField("alt")` when alt is set to blank text
    pub fn validate(&self) -> Result<(), ContentError> {
        match &self.alt {
            Some(alt) if alt.trim().is_empty() => Err(ContentError::missing("alt")),
            _ => Ok(()),
        }
    }

    /// Apply to a record (call [`Self::validate`] first)
    pub fn apply(&self, figure: &mut Figure) {
        if let Some(alt) = &self.alt {
            figure.alt = alt.trim().to_string();
        }
        if let Some(caption) = &self.caption {
            let caption = caption.trim();
            figure.caption = (!caption.is_empty()).then(|| caption.to_string());
        }
        if let Some(key) = &self.figure_key {
            figure.figure_key = key.clone();
        }
    }
}
