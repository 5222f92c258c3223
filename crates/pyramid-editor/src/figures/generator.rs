//! Figure generation pipeline
//!
//! ```text
//! request ─▶ enhance prompt ─▶ generate ─▶ decode/fetch ─▶ store bytes ─▶ create | replace
//!               │ (fails)
//!               └─▶ style template
//! ```
//!
//! The figure record is only written after every external call succeeded.

use crate::config::EditorConfig;
use crate::error::EditorError;
use pyramid_content::{
    AspectRatio, ContentError, DraftId, FigureId, FigureKey, FigureStyle, NewFigure, Provenance,
    Resolution, StorageRef,
};
use pyramid_store::{
    timeout, FigureStore, GenerationRequest, ImageFetcher, ImageGenerator, ImagePayload,
    ImageStorage, PromptEnhancer, TemplateEnhancer,
};
use std::sync::Arc;
use tracing::{info, warn};

/// What to draw
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FigureRequest {
    /// Authored prompt
    pub prompt: String,
    /// Style; configured default when `None`
    pub style: Option<FigureStyle>,
    /// Aspect ratio; configured default when `None`
    pub aspect_ratio: Option<AspectRatio>,
    /// Resolution; configured default when `None`
    pub resolution: Option<Resolution>,
}

impl FigureRequest {
    /// Request with defaults for everything but the prompt
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// With style
    #[must_use]
    pub fn with_style(mut self, style: FigureStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// With aspect ratio
    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    fn validate(&self) -> Result<(), ContentError> {
        if self.prompt.trim().is_empty() {
            return Err(ContentError::missing("prompt"));
        }
        Ok(())
    }
}

/// Where the generated image goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationTarget {
    /// New figure record
    Create {
        /// Owning draft
        draft_id: DraftId,
        /// Authored identifier
        figure_key: FigureKey,
        /// Alt text
        alt: String,
        /// Optional caption
        caption: Option<String>,
    },
    /// Replace the image of an existing figure
    Replace(FigureId),
}

/// Committed generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFigure {
    /// Created or updated figure
    pub figure_id: FigureId,
    /// Stored image
    pub storage_ref: StorageRef,
    /// Recorded provenance
    pub provenance: Provenance,
    /// Generator's description of the image
    pub description: String,
}

/// Runs the generation pipeline against injected services
#[derive(Debug, Clone)]
pub struct FigureGenerator {
    enhancer: Arc<dyn PromptEnhancer>,
    generator: Arc<dyn ImageGenerator>,
    fetcher: Arc<dyn ImageFetcher>,
    storage: Arc<dyn ImageStorage>,
    figures: Arc<dyn FigureStore>,
    config: EditorConfig,
}

impl FigureGenerator {
    /// Pipeline with the template enhancer and default configuration
    #[must_use]
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        fetcher: Arc<dyn ImageFetcher>,
        storage: Arc<dyn ImageStorage>,
        figures: Arc<dyn FigureStore>,
    ) -> Self {
        Self {
            enhancer: Arc::new(TemplateEnhancer),
            generator,
            fetcher,
            storage,
            figures,
            config: EditorConfig::default(),
        }
    }

    /// With an LLM prompt rewriter
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate an image and commit it to `target`
    ///
    /// # Errors
    /// `Validation` before any call, `UnknownFigure` for a missing replace
    /// target, `Generation`/`Decode` for generator output problems, or the
    /// store failure while saving
    pub async fn generate(
        &self,
        request: &FigureRequest,
        target: GenerationTarget,
    ) -> Result<GeneratedFigure, EditorError> {
        request.validate()?;
        match &target {
            GenerationTarget::Create { alt, .. } if alt.trim().is_empty() => {
                return Err(ContentError::missing("alt").into());
            }
            GenerationTarget::Replace(figure_id) => {
                let exists = timeout::bounded(
                    self.config.mutation_timeout(),
                    self.figures.get_figure(*figure_id),
                )
                .await?
                .is_some();
                if !exists {
                    return Err(EditorError::UnknownFigure(*figure_id));
                }
            }
            GenerationTarget::Create { .. } => {}
        }

        let style = request.style.unwrap_or(self.config.default_style);
        let aspect_ratio = request
            .aspect_ratio
            .unwrap_or(self.config.default_aspect_ratio);
        let resolution = request.resolution.unwrap_or(self.config.default_resolution);

        let enhanced_prompt = self.enhance(&request.prompt, style).await;
        let generation = GenerationRequest {
            prompt: enhanced_prompt.clone(),
            style,
            aspect_ratio,
            resolution,
        };

        let response = timeout::bounded(
            self.config.generation_timeout(),
            self.generator.generate(&generation),
        )
        .await
        .map_err(|e| EditorError::Generation(e.to_string()))?;
        let image = response
            .first_image()
            .map_err(|e| EditorError::Generation(e.to_string()))?;

        let (bytes, content_type) = match ImagePayload::parse(&image.url)
            .map_err(|e| EditorError::Decode(e.to_string()))?
        {
            ImagePayload::Inline {
                content_type,
                bytes,
            } => (bytes, content_type),
            ImagePayload::Remote(url) => {
                timeout::bounded(self.config.mutation_timeout(), self.fetcher.fetch(&url))
                    .await
                    .map_err(|e| EditorError::Generation(format!("fetching image: {e}")))?
            }
        };
        if bytes.is_empty() {
            return Err(EditorError::Decode("generated image is empty".into()));
        }

        let storage_ref = timeout::bounded(
            self.config.mutation_timeout(),
            self.storage.store(bytes, &content_type),
        )
        .await?;

        let (width, height) = if image.width > 0 && image.height > 0 {
            (image.width, image.height)
        } else {
            resolution.dimensions(aspect_ratio)
        };
        let provenance = Provenance {
            original_prompt: request.prompt.trim().to_string(),
            enhanced_prompt,
            style,
            width,
            height,
        };

        let figure_id = match target {
            GenerationTarget::Create {
                draft_id,
                figure_key,
                alt,
                caption,
            } => {
                let new = NewFigure {
                    figure_key,
                    storage_ref,
                    alt,
                    caption,
                    provenance: Some(provenance.clone()),
                };
                timeout::bounded(
                    self.config.mutation_timeout(),
                    self.figures.create_figure(draft_id, new),
                )
                .await?
            }
            GenerationTarget::Replace(figure_id) => {
                timeout::bounded(
                    self.config.mutation_timeout(),
                    self.figures.replace_figure_image(
                        figure_id,
                        storage_ref,
                        Some(provenance.clone()),
                    ),
                )
                .await?;
                figure_id
            }
        };

        info!(figure = %figure_id, %style, %aspect_ratio, %resolution, "figure generated");
        Ok(GeneratedFigure {
            figure_id,
            storage_ref,
            provenance,
            description: response.description.clone(),
        })
    }

    async fn enhance(&self, prompt: &str, style: FigureStyle) -> String {
        match timeout::bounded(
            self.config.mutation_timeout(),
            self.enhancer.enhance(prompt, style),
        )
        .await
        {
            Ok(enhanced) if !enhanced.trim().is_empty() => enhanced,
            Ok(_) => style.apply(prompt),
            Err(err) => {
                warn!(error = %err, "prompt enhancement failed, using style template");
                style.apply(prompt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pyramid_store::{GeneratedImage, GenerationResponse, MemoryBackend, StoreError};

    #[derive(Debug, Default)]
    struct ScriptedGenerator {
        url: String,
        fail: bool,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, StoreError> {
            self.seen.lock().push(request.clone());
            if self.fail {
                return Err(StoreError::Backend("model overloaded".into()));
            }
            Ok(GenerationResponse {
                images: vec![GeneratedImage {
                    url: self.url.clone(),
                    width: 0,
                    height: 0,
                }],
                description: "a pyramid".into(),
            })
        }
    }

    #[derive(Debug)]
    struct NoFetch;

    #[async_trait]
    impl ImageFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), StoreError> {
            Err(StoreError::Network(format!("unreachable: {url}")))
        }
    }

    #[derive(Debug)]
    struct BrokenEnhancer;

    #[async_trait]
    impl PromptEnhancer for BrokenEnhancer {
        async fn enhance(&self, _prompt: &str, _style: FigureStyle) -> Result<String, StoreError> {
            Err(StoreError::Backend("llm down".into()))
        }
    }

    fn pipeline(generator: ScriptedGenerator) -> (Arc<MemoryBackend>, Arc<ScriptedGenerator>, FigureGenerator) {
        let backend = Arc::new(MemoryBackend::new());
        let generator = Arc::new(generator);
        let pipeline = FigureGenerator::new(
            generator.clone(),
            Arc::new(NoFetch),
            backend.clone(),
            backend.clone(),
        );
        (backend, generator, pipeline)
    }

    fn create_target() -> GenerationTarget {
        GenerationTarget::Create {
            draft_id: DraftId::new(),
            figure_key: FigureKey::parse("fig-layers").unwrap(),
            alt: "Layers of the pyramid".into(),
            caption: None,
        }
    }

    #[tokio::test]
    async fn inline_image_creates_figure() {
        let (backend, generator, pipeline) = pipeline(ScriptedGenerator {
            url: "data:image/png;base64,iVBORw0K".into(),
            ..ScriptedGenerator::default()
        });

        let result = pipeline
            .generate(
                &FigureRequest::new("Five stacked layers").with_aspect_ratio(AspectRatio::Wide),
                create_target(),
            )
            .await
            .unwrap();

        let figure = backend.figure(result.figure_id).unwrap();
        assert_eq!(figure.storage_ref, result.storage_ref);
        let provenance = figure.provenance.unwrap();
        assert_eq!(provenance.original_prompt, "Five stacked layers");
        assert_eq!((provenance.width, provenance.height), (1024, 576));
        assert_eq!(generator.seen.lock()[0].prompt, provenance.enhanced_prompt);
        assert_eq!(result.description, "a pyramid");
    }

    #[tokio::test]
    async fn enhancer_failure_falls_back_to_template() {
        let (_, generator, pipeline) = pipeline(ScriptedGenerator {
            url: "data:image/png;base64,iVBORw0K".into(),
            ..ScriptedGenerator::default()
        });
        let pipeline = pipeline.with_enhancer(Arc::new(BrokenEnhancer));

        pipeline
            .generate(
                &FigureRequest::new("A ladder").with_style(FigureStyle::Sketch),
                create_target(),
            )
            .await
            .unwrap();

        assert_eq!(
            generator.seen.lock()[0].prompt,
            FigureStyle::Sketch.apply("A ladder")
        );
    }

    #[tokio::test]
    async fn generator_failure_commits_nothing() {
        let (backend, _, pipeline) = pipeline(ScriptedGenerator {
            fail: true,
            ..ScriptedGenerator::default()
        });

        let err = pipeline
            .generate(&FigureRequest::new("anything"), create_target())
            .await
            .unwrap_err();

        assert_eq!(err, EditorError::Generation("backend error: model overloaded".into()));
        assert_eq!(backend.calls().uploads, 0);
        assert_eq!(backend.calls().figure_writes, 0);
    }

    #[tokio::test]
    async fn remote_fetch_failure_commits_nothing() {
        let (backend, _, pipeline) = pipeline(ScriptedGenerator {
            url: "https://cdn.example.com/img.png".into(),
            ..ScriptedGenerator::default()
        });

        let err = pipeline
            .generate(&FigureRequest::new("anything"), create_target())
            .await
            .unwrap_err();

        assert!(matches!(err, EditorError::Generation(_)));
        assert_eq!(backend.calls().uploads, 0);
    }

    #[tokio::test]
    async fn blank_prompt_rejected_before_any_call() {
        let (backend, generator, pipeline) = pipeline(ScriptedGenerator::default());
        let err = pipeline
            .generate(&FigureRequest::new("   "), create_target())
            .await
            .unwrap_err();

        assert_eq!(err, EditorError::Validation(ContentError::missing("prompt")));
        assert!(generator.seen.lock().is_empty());
        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn replace_keeps_alt_and_records_provenance() {
        let (backend, _, pipeline) = pipeline(ScriptedGenerator {
            url: "data:image/webp;base64,UklGRg==".into(),
            ..ScriptedGenerator::default()
        });
        let first = pipeline
            .generate(&FigureRequest::new("first"), create_target())
            .await
            .unwrap();

        let second = pipeline
            .generate(
                &FigureRequest::new("second").with_style(FigureStyle::Photo),
                GenerationTarget::Replace(first.figure_id),
            )
            .await
            .unwrap();

        assert_eq!(second.figure_id, first.figure_id);
        let figure = backend.figure(first.figure_id).unwrap();
        assert_eq!(figure.alt, "Layers of the pyramid");
        assert_eq!(figure.provenance.unwrap().style, FigureStyle::Photo);
    }
}
