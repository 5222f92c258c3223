//! `pyramid codes ...`

use crate::Report;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pyramid_access::{AccessCode, AccessCodes, AccessStore, CodeBook, JsonFileStorage, MemoryCodeStore};
use std::path::Path;
use std::sync::Arc;

/// Add or replace a code in the book, creating the book if needed
///
/// # Errors
/// Unreadable book, bad expiry, or write failure
pub fn add(book_path: &Path, code: &str, max_uses: Option<u32>, expires: Option<&str>) -> Result<Report> {
    let book = if book_path.exists() {
        CodeBook::load(book_path)?
    } else {
        CodeBook::default()
    };
    let mut entry = AccessCode::new(code.trim());
    entry.max_uses = max_uses;
    if let Some(expires) = expires {
        let at = DateTime::parse_from_rfc3339(expires)
            .with_context(|| format!("expiry '{expires}'"))?;
        entry = entry.expiring(at.with_timezone(&Utc));
    }

    let store = MemoryCodeStore::from_book(book);
    store.upsert(entry);
    store.snapshot().save(book_path)?;
    tracing::info!(code = code.trim(), "code saved");
    Ok(Report::ok(format!("saved {}\n", code.trim())))
}

/// Redeem a code, recording the use in the book.
///
/// The book is only rewritten when the code was accepted. With an access
/// file the grant is remembered there too.
///
/// # Errors
/// Unreadable or unwritable files
pub async fn redeem(book_path: &Path, code: &str, access_file: Option<&Path>) -> Result<Report> {
    let store = Arc::new(MemoryCodeStore::from_book(CodeBook::load(book_path)?));
    let codes = AccessCodes::new(store.clone());

    let result = match access_file {
        Some(path) => {
            let mut access = AccessStore::load(JsonFileStorage::new(path))?;
            access.redeem(&codes, code).await?
        }
        None => codes.redeem(code).await?,
    };
    if result.valid {
        store.snapshot().save(book_path)?;
    }

    let mut output = serde_json::to_string(&result)?;
    output.push('\n');
    Ok(Report {
        output,
        success: result.valid,
    })
}
