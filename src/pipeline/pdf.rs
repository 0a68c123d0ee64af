//! Page counting.
//!
//! Parsing runs inside `spawn_blocking`: lopdf reads and decodes the whole
//! object graph synchronously, which can take a while on large documents.
//! Every failure becomes [`PageCount::Unreadable`] instead of an error; the
//! caller decides what the client sees.

use crate::output::PageCount;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// Count the pages of the PDF at `path`.
pub async fn count_pages(path: &Path) -> PageCount {
    let path = path.to_path_buf();
    match tokio::task::spawn_blocking(move || count_pages_blocking(&path)).await {
        Ok(count) => count,
        Err(e) => PageCount::Unreadable {
            detail: format!("Count task panicked: {}", e),
        },
    }
}

fn count_pages_blocking(path: &Path) -> PageCount {
    match Document::load(path) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            debug!("{}: {} pages", path.display(), pages);
            PageCount::Counted(pages)
        }
        Err(e) => PageCount::Unreadable {
            detail: e.to_string(),
        },
    }
}
