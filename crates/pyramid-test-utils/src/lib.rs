//! Testing utilities for the Pyramid workspace
//!
//! Shared fixtures and scripted collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use pyramid_content::{
    Block, BlockId, BlockType, ChapterId, DraftId, Figure, FigureKey, FigureStyle, StorageRef,
};
use pyramid_store::{
    GeneratedImage, GenerationRequest, GenerationResponse, ImageFetcher, ImageGenerator,
    MemoryBackend, PromptEnhancer, StoreError,
};

/// PNG signature, enough for anything that sniffs bytes
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

pub fn png_data_url() -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
    )
}

pub fn paragraphs(chapter: ChapterId, contents: &[&str]) -> Vec<Block> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| Block::new(chapter, BlockType::Paragraph, *content, i as f64))
        .collect()
}

/// Seed a chapter of paragraphs into `store`, returning ids in order
pub fn seed_chapter(store: &MemoryBackend, contents: &[&str]) -> (ChapterId, Vec<BlockId>) {
    let chapter = ChapterId::new();
    let blocks = paragraphs(chapter, contents);
    let ids = blocks.iter().map(|b| b.id).collect();
    for block in blocks {
        store.seed_block(block);
    }
    (chapter, ids)
}

pub fn sample_figure(draft: DraftId, key: &str) -> Figure {
    Figure::new(
        draft,
        FigureKey::parse(key).unwrap(),
        StorageRef::compute(key.as_bytes()),
        format!("Alt text for {key}"),
    )
}

/// Generator that answers every request with the same image URL
#[derive(Debug)]
pub struct StubGenerator {
    url: String,
    width: u32,
    height: u32,
    requests: Mutex<Vec<GenerationRequest>>,
    failure: Mutex<Option<StoreError>>,
}

impl StubGenerator {
    pub fn inline_png() -> Self {
        Self::with_url(png_data_url())
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: 1024,
            height: 768,
            requests: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, error: StoreError) {
        *self.failure.lock() = Some(error);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, StoreError> {
        self.requests.lock().push(request.clone());
        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }
        Ok(GenerationResponse {
            images: vec![GeneratedImage {
                url: self.url.clone(),
                width: self.width,
                height: self.height,
            }],
            description: format!("image for: {}", request.prompt),
        })
    }
}

/// Fetcher serving fixed bytes for any URL
#[derive(Debug, Default)]
pub struct StubFetcher {
    fetched: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), StoreError> {
        self.fetched.lock().push(url.to_string());
        Ok((PNG_BYTES.to_vec(), "image/png".to_string()))
    }
}

/// Enhancer that tags the prompt so tests can see it ran
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggingEnhancer;

#[async_trait]
impl PromptEnhancer for TaggingEnhancer {
    async fn enhance(&self, prompt: &str, style: FigureStyle) -> Result<String, StoreError> {
        Ok(format!("[{style}] {prompt}"))
    }
}
