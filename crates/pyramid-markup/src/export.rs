//! Chapter blocks → markdown

use crate::document::ChapterDocument;
use crate::error::MarkupError;
use crate::figure_spec::image_markdown;
use crate::frontmatter;
use crate::import::EMPTY_FIGURE;
use pyramid_content::{Block, BlockType, ListKind};

/// Render a document as markdown, blocks separated by blank lines.
///
/// Figure blocks that came from a spec are written back as the spec; linked
/// figures become images; anything else leaves an [`EMPTY_FIGURE`] marker.
/// Empty text blocks are skipped. Chapter metadata, when present, leads as
/// YAML frontmatter.
///
/// # Errors
/// Metadata that cannot be written as YAML
pub fn export(doc: &ChapterDocument) -> Result<String, MarkupError> {
    let mut parts: Vec<String> = Vec::with_capacity(doc.blocks.len() + 2);
    if let Some(meta) = &doc.meta {
        parts.push(frontmatter::render(meta)?);
    }
    if let Some(title) = &doc.title {
        parts.push(format!("# {title}"));
    }

    let mut blocks: Vec<&Block> = doc.blocks.iter().collect();
    blocks.sort_by(|a, b| a.order.total_cmp(&b.order));

    for block in blocks {
        if block.block_type == BlockType::Figure {
            parts.push(figure_markdown(doc, block));
        } else if !block.content.trim().is_empty() {
            parts.push(block_markdown(block.block_type, &block.content));
        }
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    Ok(out)
}

fn figure_markdown(doc: &ChapterDocument, block: &Block) -> String {
    if let Some(spec) = doc.specs.get(&block.id) {
        return spec.to_fence();
    }
    block
        .figure_id
        .and_then(|id| doc.figures.get(&id))
        .map_or_else(
            || EMPTY_FIGURE.to_string(),
            |image| image_markdown(&image.alt, &image.src, image.caption.as_deref()),
        )
}

/// Markdown for one text block
#[must_use]
pub fn block_markdown(block_type: BlockType, content: &str) -> String {
    match block_type {
        BlockType::Paragraph | BlockType::Table | BlockType::Figure => content.to_string(),
        BlockType::Heading2 | BlockType::Heading3 | BlockType::Heading4 => {
            let level = block_type.heading_level().unwrap_or(2) as usize;
            format!("{} {}", "#".repeat(level), content.replace('\n', " "))
        }
        BlockType::Blockquote => content
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        BlockType::List { list_type } => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| match list_type {
                ListKind::Bullet => format!("- {line}"),
                ListKind::Numbered => format!("{}. {line}", i + 1),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        BlockType::Code => {
            let fence = if content.contains("```") { "~~~" } else { "```" };
            format!("{fence}\n{content}\n{fence}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import;
    use pretty_assertions::assert_eq;
    use pyramid_content::ChapterId;

    #[test]
    fn renders_each_block_type() {
        assert_eq!(block_markdown(BlockType::Heading3, "Layers"), "### Layers");
        assert_eq!(block_markdown(BlockType::Blockquote, "a\n\nb"), "> a\n>\n> b");
        assert_eq!(block_markdown(BlockType::NUMBERED_LIST, "one\ntwo"), "1. one\n2. two");
        assert_eq!(block_markdown(BlockType::BULLET_LIST, "x\n\ny"), "- x\n- y");
        assert_eq!(
            block_markdown(BlockType::Code, "```nested```"),
            "~~~\n```nested```\n~~~"
        );
    }

    #[test]
    fn exports_in_key_order_and_skips_empty_text() {
        let chapter = ChapterId::new();
        let mut doc = ChapterDocument::new(chapter);
        doc.title = Some("Title".into());
        doc.blocks = vec![
            Block::new(chapter, BlockType::Paragraph, "second", 2.0),
            Block::new(chapter, BlockType::Heading2, "first", 0.5),
            Block::new(chapter, BlockType::Paragraph, "  ", 1.0),
            Block::new(chapter, BlockType::Figure, "", 3.0),
        ];

        assert_eq!(
            export(&doc).unwrap(),
            "# Title\n\n## first\n\nsecond\n\n<!-- figure -->\n"
        );
    }

    #[test]
    fn export_then_import_keeps_structure() {
        let source = "\
---
slug: pivots
number: 4
---
# Pivots

Intro text.

## Layers

- a
- b

> quote

```figure
id: fig-x
prompt: A pivot
alt: Pivot
```

![Done](https://cdn.example.com/d.png \"Figure 2\")
";
        let first = import(source, ChapterId::new()).unwrap();
        let again = import(&export(&first).unwrap(), first.chapter_id).unwrap();

        let shape = |doc: &ChapterDocument| -> Vec<(BlockType, String)> {
            doc.blocks
                .iter()
                .map(|b| (b.block_type, b.content.clone()))
                .collect()
        };
        assert_eq!(shape(&again), shape(&first));
        assert_eq!(again.title, first.title);
        assert_eq!(again.meta, first.meta);
        assert_eq!(
            again.pending().collect::<Vec<_>>(),
            first.pending().collect::<Vec<_>>()
        );
        assert_eq!(
            again.figures.values().collect::<Vec<_>>(),
            first.figures.values().collect::<Vec<_>>()
        );
    }

    #[test]
    fn metadata_leads_as_frontmatter() {
        let mut doc = ChapterDocument::new(ChapterId::new());
        doc.meta = Some(crate::ChapterMeta {
            slug: Some("intro".into()),
            ..Default::default()
        });
        doc.title = Some("Intro".into());

        assert_eq!(export(&doc).unwrap(), "---\nslug: intro\n---\n\n# Intro\n");
    }
}
