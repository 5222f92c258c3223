//! Figure specs embedded in chapter markdown
//!
//! Authors describe figures in fenced blocks with the info string `figure`:
//!
//! ````markdown
//! ```figure
//! id: fig-pyramid-overview
//! prompt: The four layers of the pivot pyramid, stacked
//! alt: Pivot pyramid with four layers
//! caption: Figure 1.1
//! style: pyramid
//! aspect_ratio: 4:3
//! ```
//! ````
//!
//! A spec with a `src` is *locked*: rendering replaces it with a plain
//! markdown image. A spec without one is *pending* generation.

use crate::error::MarkupError;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use pyramid_content::{AspectRatio, ContentError, FigureKey, FigureStyle, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::str::FromStr;

/// Fence info string marking a figure spec
pub const INFO_STRING: &str = "figure";

const KEYS: [&str; 8] = [
    "id",
    "prompt",
    "alt",
    "caption",
    "style",
    "aspect_ratio",
    "resolution",
    "src",
];

/// A parsed figure spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSpec {
    /// Authored figure id
    pub id: FigureKey,
    /// Generation prompt
    pub prompt: String,
    /// Alt text
    pub alt: String,
    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Style preset
    #[serde(default)]
    pub style: FigureStyle,
    /// Output aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Output resolution
    #[serde(default)]
    pub resolution: Resolution,
    /// Image location once generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl FigureSpec {
    /// Whether the spec points at a generated image
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.src.is_some()
    }

    /// Markdown image for a locked spec
    ///
    /// The title is omitted when there is no caption.
    #[must_use]
    pub fn image_markdown(&self) -> Option<String> {
        self.src
            .as_deref()
            .map(|src| image_markdown(&self.alt, src, self.caption.as_deref()))
    }

    /// Canonical fenced form
    #[must_use]
    pub fn to_fence(&self) -> String {
        let mut out = format!("```{INFO_STRING}\n");
        out.push_str(&format!("id: {}\n", self.id));
        out.push_str(&format!("prompt: {}\n", self.prompt));
        out.push_str(&format!("alt: {}\n", self.alt));
        if let Some(caption) = &self.caption {
            out.push_str(&format!("caption: {caption}\n"));
        }
        out.push_str(&format!("style: {}\n", self.style));
        out.push_str(&format!("aspect_ratio: {}\n", self.aspect_ratio));
        out.push_str(&format!("resolution: {}\n", self.resolution));
        if let Some(src) = &self.src {
            out.push_str(&format!("src: {src}\n"));
        }
        out.push_str("```");
        out
    }

    /// Parse the body of the fence opened on `fence_line`.
    ///
    /// Collects every problem instead of stopping at the first.
    fn parse_body(body: &str, fence_line: usize) -> Result<Self, Vec<MarkupError>> {
        let mut errors = Vec::new();
        let mut fields: HashMap<&str, (usize, String)> = HashMap::new();

        for (offset, raw) in body.lines().enumerate() {
            let line = fence_line + 1 + offset;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let Some((key, value)) = text.split_once(':') else {
                errors.push(MarkupError::Malformed {
                    line,
                    text: text.to_string(),
                });
                continue;
            };
            let key = key.trim();
            let Some(&known) = KEYS.iter().find(|k| **k == key) else {
                errors.push(MarkupError::UnknownKey {
                    line,
                    key: key.to_string(),
                });
                continue;
            };
            if fields.contains_key(known) {
                errors.push(MarkupError::DuplicateKey {
                    line,
                    key: key.to_string(),
                });
                continue;
            }
            fields.insert(known, (line, unquote(value.trim()).to_string()));
        }

        let mut required = |key: &'static str| -> Option<(usize, String)> {
            match fields.get(key) {
                Some((line, value)) if !value.is_empty() => Some((*line, value.clone())),
                Some((line, _)) => {
                    errors.push(MarkupError::field(*line, ContentError::missing(key)));
                    None
                }
                None => {
                    errors.push(MarkupError::field(fence_line, ContentError::missing(key)));
                    None
                }
            }
        };
        let id = required("id");
        let prompt = required("prompt");
        let alt = required("alt");

        let id = id.and_then(|(line, value)| {
            FigureKey::parse(value)
                .map_err(|e| errors.push(MarkupError::field(line, e)))
                .ok()
        });
        let style = parsed::<FigureStyle>(&fields, "style", &mut errors);
        let aspect_ratio = parsed::<AspectRatio>(&fields, "aspect_ratio", &mut errors);
        let resolution = parsed::<Resolution>(&fields, "resolution", &mut errors);
        let optional = |key: &str| {
            fields
                .get(key)
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_empty())
        };

        match (id, prompt, alt) {
            (Some(id), Some((_, prompt)), Some((_, alt))) if errors.is_empty() => Ok(Self {
                id,
                prompt,
                alt,
                caption: optional("caption"),
                style,
                aspect_ratio,
                resolution,
                src: optional("src"),
            }),
            _ => Err(errors),
        }
    }
}

fn parsed<T>(
    fields: &HashMap<&str, (usize, String)>,
    key: &str,
    errors: &mut Vec<MarkupError>,
) -> T
where
    T: FromStr<Err = ContentError> + Default,
{
    match fields.get(key) {
        Some((line, value)) if !value.is_empty() => value.parse().unwrap_or_else(|e| {
            errors.push(MarkupError::field(*line, e));
            T::default()
        }),
        _ => T::default(),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// `![alt](src "caption")`, escaping the characters that would end each part
#[must_use]
pub fn image_markdown(alt: &str, src: &str, caption: Option<&str>) -> String {
    let alt = alt.replace('[', "\\[").replace(']', "\\]");
    let src = if src.contains(char::is_whitespace) {
        format!("<{src}>")
    } else {
        src.to_string()
    };
    match caption {
        Some(caption) => format!("![{alt}]({src} \"{}\")", caption.replace('"', "\\\"")),
        None => format!("![{alt}]({src})"),
    }
}

/// A spec and where it sits in its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSpec {
    /// Parsed spec
    pub spec: FigureSpec,
    /// 1-based line of the opening fence
    pub line: usize,
    /// Byte range of the whole fenced block
    pub range: Range<usize>,
}

/// Byte offset → 1-based line lookup
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub(crate) fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

struct RawSpec {
    line: usize,
    range: Range<usize>,
    body: String,
}

fn is_figure_fence(info: &str) -> bool {
    info.split_whitespace().next() == Some(INFO_STRING)
}

fn scan(source: &str) -> Vec<RawSpec> {
    let lines = LineIndex::new(source);
    let mut specs = Vec::new();
    let mut current: Option<RawSpec> = None;

    for (event, range) in Parser::new_ext(source, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if is_figure_fence(&info) => {
                current = Some(RawSpec {
                    line: lines.line(range.start),
                    range,
                    body: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(raw) = current.as_mut() {
                    raw.body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(raw) = current.take() {
                    specs.push(raw);
                }
            }
            _ => {}
        }
    }
    specs
}

fn collect(source: &str) -> (Vec<LocatedSpec>, Vec<MarkupError>) {
    let mut specs = Vec::new();
    let mut errors = Vec::new();
    let mut seen: HashMap<FigureKey, usize> = HashMap::new();

    for raw in scan(source) {
        match FigureSpec::parse_body(&raw.body, raw.line) {
            Ok(spec) => {
                if let Some(first) = seen.get(&spec.id) {
                    errors.push(MarkupError::DuplicateId {
                        line: raw.line,
                        id: spec.id.to_string(),
                        first: *first,
                    });
                    continue;
                }
                seen.insert(spec.id.clone(), raw.line);
                specs.push(LocatedSpec {
                    spec,
                    line: raw.line,
                    range: raw.range,
                });
            }
            Err(found) => errors.extend(found),
        }
    }
    (specs, errors)
}

/// Every problem in a document's figure specs, in source order.
///
/// An empty list means the document is valid.
#[must_use]
pub fn validate(source: &str) -> Vec<MarkupError> {
    collect(source).1
}

/// All figure specs in a document
///
/// # Errors
/// The first validation problem, see [`validate`] for all of them
pub fn parse(source: &str) -> Result<Vec<LocatedSpec>, MarkupError> {
    let (specs, errors) = collect(source);
    match errors.into_iter().next() {
        Some(first) => Err(first),
        None => Ok(specs),
    }
}

/// Specs still waiting for an image
///
/// # Errors
/// As [`parse`]
pub fn pending(source: &str) -> Result<Vec<LocatedSpec>, MarkupError> {
    Ok(parse(source)?
        .into_iter()
        .filter(|located| !located.spec.is_locked())
        .collect())
}

/// Rendering switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Replace pending specs with a placeholder comment
    pub strip_pending: bool,
}

/// Placeholder left where a pending spec was stripped
#[must_use]
pub fn pending_placeholder(id: &FigureKey) -> String {
    format!("<!-- figure pending: {id} -->")
}

/// Document with locked specs turned into markdown images.
///
/// Pending specs stay in place unless `strip_pending` is set.
///
/// # Errors
/// As [`parse`]
pub fn render(source: &str, options: RenderOptions) -> Result<String, MarkupError> {
    let specs = parse(source)?;
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;

    for located in specs {
        let replacement = match located.spec.image_markdown() {
            Some(image) => image,
            None if options.strip_pending => pending_placeholder(&located.spec.id),
            None => continue,
        };
        let block = &source[located.range.clone()];
        out.push_str(&source[cursor..located.range.start]);
        out.push_str(&replacement);
        if block.ends_with('\n') {
            out.push('\n');
        }
        cursor = located.range.end;
    }
    out.push_str(&source[cursor..]);
    tracing::debug!(bytes = out.len(), "rendered figure specs");
    Ok(out)
}

/// Document with `src` recorded on the spec `id`, locking it.
///
/// The spec is rewritten in canonical form.
///
/// # Errors
/// As [`parse`], or `NotFound` when no spec has that id
pub fn lock(source: &str, id: &FigureKey, src: &str) -> Result<String, MarkupError> {
    let located = parse(source)?
        .into_iter()
        .find(|located| &located.spec.id == id)
        .ok_or_else(|| MarkupError::NotFound(id.to_string()))?;

    let mut spec = located.spec;
    spec.src = Some(src.trim().to_string());
    let block = &source[located.range.clone()];
    let mut out = String::with_capacity(source.len() + src.len());
    out.push_str(&source[..located.range.start]);
    out.push_str(&spec.to_fence());
    if block.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&source[located.range.end..]);
    tracing::info!(figure = %id, "locked figure spec");
    Ok(out)
}
