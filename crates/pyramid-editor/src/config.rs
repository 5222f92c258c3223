//! Editor configuration

use crate::error::EditorError;
use pyramid_content::{ordering, AspectRatio, FigureStyle, Resolution};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Editor configuration
///
/// Every field has a default, so a TOML file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Deadline for store mutations and loads, in milliseconds
    pub mutation_timeout_ms: u64,
    /// Deadline for image generation, in milliseconds
    pub generation_timeout_ms: u64,
    /// Smallest usable gap between adjacent order keys
    pub renumber_epsilon: f64,
    /// Reject linking a figure that another block already shows
    pub one_figure_per_block: bool,
    /// Style used when a request names none
    pub default_style: FigureStyle,
    /// Aspect ratio used when a request names none
    pub default_aspect_ratio: AspectRatio,
    /// Resolution used when a request names none
    pub default_resolution: Resolution,
    /// Figure URLs kept in memory
    pub url_cache_capacity: u64,
}

impl EditorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// `Config` for malformed TOML, unknown keys or invalid values
    pub fn from_toml_str(source: &str) -> Result<Self, EditorError> {
        let config: Self =
            toml::from_str(source).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `Config` naming the offending field
    pub fn validate(&self) -> Result<(), EditorError> {
        if self.mutation_timeout_ms == 0 {
            return Err(EditorError::Config("mutation_timeout_ms must be > 0".into()));
        }
        if self.generation_timeout_ms == 0 {
            return Err(EditorError::Config(
                "generation_timeout_ms must be > 0".into(),
            ));
        }
        if !(self.renumber_epsilon.is_finite() && self.renumber_epsilon >= 0.0) {
            return Err(EditorError::Config(
                "renumber_epsilon must be a non-negative number".into(),
            ));
        }
        if self.url_cache_capacity == 0 {
            return Err(EditorError::Config("url_cache_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// With mutation deadline
    #[inline]
    #[must_use]
    pub fn with_mutation_timeout(mut self, timeout: Duration) -> Self {
        self.mutation_timeout_ms = duration_ms(timeout);
        self
    }

    /// With generation deadline
    #[inline]
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout_ms = duration_ms(timeout);
        self
    }

    /// With renumbering threshold
    #[inline]
    #[must_use]
    pub fn with_renumber_epsilon(mut self, epsilon: f64) -> Self {
        self.renumber_epsilon = epsilon;
        self
    }

    /// Allow or forbid one figure on several blocks
    #[inline]
    #[must_use]
    pub fn with_one_figure_per_block(mut self, enforce: bool) -> Self {
        self.one_figure_per_block = enforce;
        self
    }

    /// With default style
    #[inline]
    #[must_use]
    pub fn with_default_style(mut self, style: FigureStyle) -> Self {
        self.default_style = style;
        self
    }

    /// Mutation deadline
    #[inline]
    #[must_use]
    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }

    /// Generation deadline
    #[inline]
    #[must_use]
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            mutation_timeout_ms: 10_000,
            generation_timeout_ms: 120_000,
            renumber_epsilon: ordering::DEFAULT_EPSILON,
            one_figure_per_block: true,
            default_style: FigureStyle::default(),
            default_aspect_ratio: AspectRatio::default(),
            default_resolution: Resolution::default(),
            url_cache_capacity: 256,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
