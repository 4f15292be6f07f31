pub mod comments;
pub mod docket;
pub mod document;

use thiserror::Error;
use tracing::debug;

use crate::browser::{NavError, Snapshot};

/// Shared by docket, document and comment pages.
pub(crate) const MAIN_CONTENT: &str = "main.main-content";
pub(crate) const PAGE_TITLE: &str = "h1.js-title";
pub(crate) const POSTED_TEXT: &str = "div.col-md-12.mt-2.mb-4 p.js-posted-text";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Nav(#[from] NavError),
    #[error("required element missing: {0}")]
    Missing(&'static str),
}

/// Read an optional field, noting its absence.
pub(crate) fn field(snap: &Snapshot, name: &'static str, css: &str) -> Option<String> {
    let value = snap.safe_text(css);
    if value.is_none() {
        debug!(field = name, selector = css, "field not present");
    }
    value
}

/// "Posted by X on Jan 3, 2024" -> "Jan 3, 2024".
pub fn posted_date(text: &str) -> String {
    match text.rsplit_once(" on ") {
        Some((_, date)) => date.trim().to_string(),
        None => text.trim().to_string(),
    }
}
