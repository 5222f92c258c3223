//! Markdown → chapter blocks
//!
//! Walks the top-level elements of a document with pulldown-cmark and maps
//! each one onto a block type. Block content keeps its inline markdown
//! source; only the block-level syntax (heading hashes, list markers, quote
//! markers, code fences) is stripped.

use crate::document::{ChapterDocument, FigureImage};
use crate::error::MarkupError;
use crate::figure_spec::{self, FigureSpec, INFO_STRING};
use crate::frontmatter;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use pyramid_content::{Block, BlockType, ChapterId, FigureId, ListKind};
use std::collections::HashMap;
use std::ops::Range;

/// Comment standing in for a figure block with nothing linked
pub const EMPTY_FIGURE: &str = "<!-- figure -->";

#[derive(Debug)]
enum Open {
    Paragraph {
        image: Option<FigureImage>,
        in_image: bool,
        extra: bool,
    },
    Heading(u8),
    Quote,
    List {
        kind: ListKind,
        items: Vec<String>,
    },
    Code {
        figure: bool,
        text: String,
    },
    Table,
    Html,
    Rule,
    Other,
}

/// Parse chapter markdown into a document
///
/// Leading `---` YAML frontmatter becomes [`crate::ChapterMeta`]. The first
/// `#` heading becomes the title; later ones import as level-2 headings.
/// Headings deeper than four levels import as level 4.
///
/// # Errors
/// Invalid frontmatter or any invalid figure spec in the source
#[tracing::instrument(skip(source), fields(bytes = source.len()))]
pub fn import(source: &str, chapter_id: ChapterId) -> Result<ChapterDocument, MarkupError> {
    let (meta, body_start) = frontmatter::split(source)?;
    // Specs are located in the whole file so error lines match it
    let specs: HashMap<usize, FigureSpec> = figure_spec::parse(source)?
        .into_iter()
        .filter(|located| located.range.start >= body_start)
        .map(|located| (located.range.start - body_start, located.spec))
        .collect();
    let source = &source[body_start..];

    let mut doc = ChapterDocument::new(chapter_id);
    doc.meta = meta;
    let mut depth = 0usize;
    let mut open: Option<(Open, Range<usize>)> = None;

    for (event, range) in Parser::new_ext(source, Options::ENABLE_TABLES).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    open = Some((open_for(&tag), range));
                } else if let Some((state, _)) = open.as_mut() {
                    observe_start(state, &tag, &source[range], depth);
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some((Open::Paragraph { in_image, .. }, _)) = open.as_mut() {
                    if depth == 1 {
                        *in_image = false;
                    }
                }
                if depth == 0 {
                    if let Some((state, range)) = open.take() {
                        close(&mut doc, state, &source[range.clone()], specs.get(&range.start));
                    }
                }
            }
            Event::Rule if depth == 0 => {
                close(&mut doc, Open::Rule, &source[range], None);
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((state, _)) = open.as_mut() {
                    observe_text(state, &text);
                }
            }
            _ => {
                if let Some((Open::Paragraph { in_image: false, extra, .. }, _)) = open.as_mut() {
                    *extra = true;
                }
            }
        }
    }

    tracing::debug!(blocks = doc.blocks.len(), figures = doc.figures.len(), "imported chapter");
    Ok(doc)
}

fn open_for(tag: &Tag<'_>) -> Open {
    match tag {
        Tag::Paragraph => Open::Paragraph {
            image: None,
            in_image: false,
            extra: false,
        },
        Tag::Heading { level, .. } => Open::Heading(*level as u8),
        Tag::BlockQuote(_) => Open::Quote,
        Tag::List(start) => Open::List {
            kind: if start.is_some() {
                ListKind::Numbered
            } else {
                ListKind::Bullet
            },
            items: Vec::new(),
        },
        Tag::CodeBlock(kind) => Open::Code {
            figure: matches!(kind, CodeBlockKind::Fenced(info)
                if info.split_whitespace().next() == Some(INFO_STRING)),
            text: String::new(),
        },
        Tag::Table(_) => Open::Table,
        Tag::HtmlBlock => Open::Html,
        _ => Open::Other,
    }
}

fn observe_start(state: &mut Open, tag: &Tag<'_>, slice: &str, depth: usize) {
    match (state, tag) {
        (
            Open::Paragraph {
                image,
                in_image,
                extra,
            },
            Tag::Image {
                dest_url, title, ..
            },
        ) => {
            if image.is_some() {
                *extra = true;
            }
            *in_image = true;
            *image = Some(FigureImage {
                alt: String::new(),
                src: dest_url.to_string(),
                caption: (!title.is_empty()).then(|| title.to_string()),
            });
        }
        (Open::Paragraph { in_image: false, extra, .. }, _) => *extra = true,
        (Open::List { items, .. }, Tag::Item) if depth == 1 => {
            items.push(list_item_text(slice));
        }
        _ => {}
    }
}

fn observe_text(state: &mut Open, text: &str) {
    match state {
        Open::Paragraph {
            image: Some(image),
            in_image: true,
            ..
        } => image.alt.push_str(text),
        Open::Paragraph { extra, .. } => {
            if !text.trim().is_empty() {
                *extra = true;
            }
        }
        Open::Code { text: code, .. } => code.push_str(text),
        _ => {}
    }
}

fn close(doc: &mut ChapterDocument, state: Open, slice: &str, spec: Option<&FigureSpec>) {
    let slice = slice.trim_end();
    let (block_type, content) = match state {
        Open::Paragraph {
            image: Some(image),
            extra: false,
            ..
        } => {
            push_figure(doc, Some(image), None);
            return;
        }
        Open::Paragraph { .. } | Open::Other => (BlockType::Paragraph, slice.to_string()),
        Open::Heading(1) if doc.title.is_none() => {
            doc.title = Some(heading_text(slice));
            return;
        }
        Open::Heading(level) => {
            let block_type = match level {
                0..=2 => BlockType::Heading2,
                3 => BlockType::Heading3,
                _ => BlockType::Heading4,
            };
            (block_type, heading_text(slice))
        }
        Open::Quote => (BlockType::Blockquote, unquote_lines(slice)),
        Open::List { kind, items } => (BlockType::List { list_type: kind }, items.join("\n")),
        Open::Code { figure: true, .. } => {
            let image = spec.and_then(|spec| {
                spec.src.as_ref().map(|src| FigureImage {
                    alt: spec.alt.clone(),
                    src: src.clone(),
                    caption: spec.caption.clone(),
                })
            });
            push_figure(doc, image, spec.cloned());
            return;
        }
        Open::Code { text, .. } => {
            let text = text.strip_suffix('\n').unwrap_or(text.as_str()).to_string();
            (BlockType::Code, text)
        }
        Open::Table => (BlockType::Table, slice.to_string()),
        Open::Html if slice == EMPTY_FIGURE || slice.starts_with("<!-- figure pending:") => {
            push_figure(doc, None, None);
            return;
        }
        Open::Html => (BlockType::Paragraph, slice.to_string()),
        Open::Rule => (BlockType::Paragraph, "---".to_string()),
    };
    let order = doc.next_order();
    doc.blocks
        .push(Block::new(doc.chapter_id, block_type, content, order));
}

fn push_figure(doc: &mut ChapterDocument, image: Option<FigureImage>, spec: Option<FigureSpec>) {
    let mut block = Block::new(doc.chapter_id, BlockType::Figure, "", doc.next_order());
    if let Some(image) = image {
        let figure_id = FigureId::new();
        doc.figures.insert(figure_id, image);
        block = block.with_figure(figure_id);
    }
    if let Some(spec) = spec {
        doc.specs.insert(block.id, spec);
    }
    doc.blocks.push(block);
}

fn heading_text(slice: &str) -> String {
    let first = slice.lines().next().unwrap_or_default().trim();
    if first.starts_with('#') {
        first
            .trim_start_matches('#')
            .trim_end_matches('#')
            .trim()
            .to_string()
    } else {
        first.to_string()
    }
}

fn unquote_lines(slice: &str) -> String {
    slice
        .lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix('>').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_item_text(slice: &str) -> String {
    let mut lines = slice.lines().map(str::trim);
    let first = lines.next().unwrap_or_default();
    let first = strip_marker(first);
    std::iter::once(first)
        .chain(lines)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return rest.trim_start();
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}
