use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::info;

use crate::model::Docket;

/// Write the docket as UTF-8 JSON with four-space indentation.
pub fn save_docket(docket: &Docket, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    docket
        .serialize(&mut ser)
        .context("Failed to serialize docket")?;
    fs::write(path, &buf).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), documents = docket.documents.len(), "docket saved");
    Ok(())
}

pub fn load_docket(path: &Path) -> Result<Docket> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
