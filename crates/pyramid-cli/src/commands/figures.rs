//! `pyramid figures ...`

use crate::Report;
use anyhow::{Context, Result};
use pyramid_content::FigureKey;
use pyramid_markup::figure_spec::{self, RenderOptions};
use serde_json::json;

/// Validate every spec, one problem per line
#[must_use]
pub fn check(source: &str) -> Report {
    let errors = figure_spec::validate(source);
    if errors.is_empty() {
        let (total, pending) = figure_spec::parse(source)
            .map(|specs| {
                let pending = specs.iter().filter(|l| !l.spec.is_locked()).count();
                (specs.len(), pending)
            })
            .unwrap_or_default();
        return Report::ok(format!("ok: {total} figure specs, {pending} pending\n"));
    }
    let output: String = errors.iter().map(|e| format!("{e}\n")).collect();
    Report::failed(output)
}

/// Specs still waiting for an image
///
/// # Errors
/// Invalid specs
pub fn pending(source: &str, as_json: bool) -> Result<Report> {
    let specs = figure_spec::pending(source)?;
    let output = if as_json {
        let entries: Vec<_> = specs
            .iter()
            .map(|l| json!({ "line": l.line, "spec": l.spec }))
            .collect();
        let mut text = serde_json::to_string_pretty(&entries)?;
        text.push('\n');
        text
    } else {
        specs
            .iter()
            .map(|l| format!("{}\t{}\t{}\n", l.line, l.spec.id, l.spec.prompt))
            .collect()
    };
    Ok(Report::ok(output))
}

/// Markdown with locked specs replaced by images
///
/// # Errors
/// Invalid specs
pub fn render(source: &str, strip_pending: bool) -> Result<String> {
    Ok(figure_spec::render(source, RenderOptions { strip_pending })?)
}

/// Markdown with `src` recorded on spec `id`
///
/// # Errors
/// Bad id, invalid specs, or no spec with that id
pub fn lock(source: &str, id: &str, src: &str) -> Result<String> {
    let key = FigureKey::parse(id).with_context(|| format!("figure id '{id}'"))?;
    Ok(figure_spec::lock(source, &key, src)?)
}
