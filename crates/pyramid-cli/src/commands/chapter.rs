//! `pyramid import` / `pyramid export`

use anyhow::{Context, Result};
use pyramid_content::{BlockId, ChapterId, DraftId, FigureId, FigureKey, NewFigure, StorageRef};
use pyramid_editor::{ChapterSession, EditorConfig, FigureService, SaveOutcome};
use pyramid_markup::{ChapterDocument, FigureImage};
use pyramid_store::{FigureStore, MemoryBackend};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Parse chapter markdown and replay it through an editor session.
///
/// Each block is inserted after the previous one the way the editor does,
/// so ids and order keys come from the block store. Images become figure
/// records linked to their blocks through the figure store, and the result
/// is read back from the store once saved.
///
/// # Errors
/// Invalid figure specs, or a store failure while staging
pub async fn import(source: &str, config: &EditorConfig) -> Result<ChapterDocument> {
    let parsed = pyramid_markup::import(source, ChapterId::new())?;
    let store = Arc::new(MemoryBackend::new());
    let session = ChapterSession::open(store.clone(), parsed.chapter_id, config).await?;
    let figures = FigureService::new(store.clone(), store.clone(), config.clone());
    let draft = DraftId::new();

    let mut staged: HashMap<BlockId, BlockId> = HashMap::with_capacity(parsed.blocks.len());
    let mut images: BTreeMap<FigureId, FigureImage> = BTreeMap::new();
    {
        let mut buffer = session.buffer().await;
        let mut after = None;
        for block in &parsed.blocks {
            let id = buffer
                .insert_block_with_content(after, block.block_type, block.content.clone())
                .await
                .context("staging block")?;
            if let Some(image) = block.figure_id.and_then(|f| parsed.figures.get(&f)) {
                let figure_key = match parsed.specs.get(&block.id) {
                    Some(spec) => spec.id.clone(),
                    None => FigureKey::parse(format!("imported-{}", images.len() + 1))?,
                };
                let figure_id = record_image(store.as_ref(), draft, figure_key, image).await?;
                figures
                    .link(id, figure_id)
                    .await
                    .context("linking imported figure")?;
                buffer.set_figure_link(id, Some(figure_id))?;
                images.insert(figure_id, image.clone());
            }
            staged.insert(block.id, id);
            after = Some(id);
        }
    }
    if let SaveOutcome::Saved(ops) = session.save().await? {
        tracing::debug!(ops, "staged chapter saved");
    }
    session.refresh().await.context("reloading staged chapter")?;

    let specs: BTreeMap<BlockId, _> = parsed
        .specs
        .into_iter()
        .filter_map(|(old, spec)| staged.get(&old).map(|new| (*new, spec)))
        .collect();
    let blocks = session.blocks().await;
    tracing::info!(
        blocks = blocks.len(),
        figures = images.len(),
        chapter = %parsed.chapter_id,
        "chapter imported"
    );

    Ok(ChapterDocument {
        chapter_id: parsed.chapter_id,
        meta: parsed.meta,
        title: parsed.title,
        blocks,
        figures: images,
        specs,
    })
}

/// Figure record for an image referenced by URL
async fn record_image(
    store: &MemoryBackend,
    draft: DraftId,
    figure_key: FigureKey,
    image: &FigureImage,
) -> Result<FigureId> {
    let alt = if image.alt.trim().is_empty() {
        figure_key.to_string()
    } else {
        image.alt.clone()
    };
    let figure = NewFigure {
        figure_key,
        storage_ref: StorageRef::compute(image.src.as_bytes()),
        alt,
        caption: image.caption.clone(),
        provenance: None,
    };
    store
        .create_figure(draft, figure)
        .await
        .context("recording imported figure")
}

/// Chapter JSON back to markdown
///
/// # Errors
/// Malformed JSON
pub fn export(json: &str) -> Result<String> {
    let doc: ChapterDocument = serde_json::from_str(json).context("parsing chapter JSON")?;
    Ok(pyramid_markup::export(&doc)?)
}
