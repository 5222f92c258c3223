//! Image generation request/response shapes and payload decoding
//!
//! Generators answer with either inline `data:` URLs carrying base64 bytes or
//! remote HTTP URLs. [`ImagePayload`] tells the two apart.

use crate::error::StoreError;
use base64::Engine as _;
use pyramid_content::{AspectRatio, FigureStyle, Resolution};
use serde::{Deserialize, Serialize};

/// Request sent to the image generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Style-enhanced prompt
    pub prompt: String,
    /// Style preset
    pub style: FigureStyle,
    /// Aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Resolution tier
    pub resolution: Resolution,
}

/// One generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// `data:` URL or remote URL
    pub url: String,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
}

/// Generator response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Images, best first
    pub images: Vec<GeneratedImage>,
    /// Model's description of what it drew
    #[serde(default)]
    pub description: String,
}

impl GenerationResponse {
    /// First image, or an error when the generator returned none
    ///
    /// # Errors
    /// `InvalidPayload` for an empty response
    pub fn first_image(&self) -> Result<&GeneratedImage, StoreError> {
        self.images
            .first()
            .ok_or_else(|| StoreError::InvalidPayload("generator returned no images".into()))
    }
}

/// Decoded location of a generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Bytes carried inline
    Inline {
        /// MIME type from the data URL
        content_type: String,
        /// Decoded bytes
        bytes: Vec<u8>,
    },
    /// Bytes must be fetched
    Remote(String),
}

impl ImagePayload {
    /// Classify and, for inline data, decode a returned image URL
    ///
    /// # Errors
    /// `InvalidPayload` for malformed data URLs or unsupported schemes
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        if let Some(rest) = url.strip_prefix("data:") {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| StoreError::InvalidPayload("data URL without ','".into()))?;
            let content_type = meta
                .strip_suffix(";base64")
                .ok_or_else(|| StoreError::InvalidPayload("data URL is not base64".into()))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|e| StoreError::InvalidPayload(format!("bad base64 image data: {e}")))?;
            let content_type = if content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                content_type.to_string()
            };
            return Ok(Self::Inline {
                content_type,
                bytes,
            });
        }

        if url.starts_with("https://") || url.starts_with("http://") {
            return Ok(Self::Remote(url.to_string()));
        }

        Err(StoreError::InvalidPayload(format!(
            "unsupported image url scheme: {}",
            url.chars().take(32).collect::<String>()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_png_is_decoded() {
        let url = "data:image/png;base64,iVBORw0K";
        let payload = ImagePayload::parse(url).unwrap();
        match payload {
            ImagePayload::Inline {
                content_type,
                bytes,
            } => {
                assert_eq!(content_type, "image/png");
                assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
            }
            ImagePayload::Remote(_) => panic!("expected inline payload"),
        }
    }

    #[test]
    fn remote_urls_pass_through() {
        let payload = ImagePayload::parse("https://cdn.example.com/a.png").unwrap();
        assert_eq!(
            payload,
            ImagePayload::Remote("https://cdn.example.com/a.png".into())
        );
    }

    #[test]
    fn malformed_payloads_rejected() {
        assert!(ImagePayload::parse("data:image/png,raw").is_err());
        assert!(ImagePayload::parse("data:image/png;base64,@@@").is_err());
        assert!(ImagePayload::parse("ftp://x/y.png").is_err());
    }

    #[test]
    fn empty_response_has_no_first_image() {
        let response = GenerationResponse {
            images: vec![],
            description: String::new(),
        };
        assert!(matches!(
            response.first_image(),
            Err(StoreError::InvalidPayload(_))
        ));
    }
}
