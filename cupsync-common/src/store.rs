//! Canonical archive document load/save
//!
//! The archive is a single pretty-printed JSON array of [`CampaignRecord`],
//! sorted descending by edition. Saves go through a sibling temp file and a
//! rename so a crash mid-write never leaves a truncated archive behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::CampaignRecord;
use crate::{Error, Result};

/// Load the archive. A missing file is an empty archive, not an error.
pub fn load(path: &Path) -> Result<Vec<CampaignRecord>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No archive file yet, starting empty");
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let records: Vec<CampaignRecord> = serde_json::from_str(&text)?;
    tracing::debug!(path = %path.display(), records = records.len(), "Archive loaded");
    Ok(records)
}

/// Sort the archive descending by edition. Editions are unique, so the
/// order is total.
pub fn sort_archive(records: &mut [CampaignRecord]) {
    records.sort_by(|a, b| b.edition.cmp(&a.edition));
}

/// Save the archive: sort, pretty-print, write temp file, rename over the
/// target.
pub fn save(path: &Path, records: &mut [CampaignRecord]) -> Result<()> {
    sort_archive(records);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(&records[..])?;
    let tmp = temp_path(path)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    tracing::info!(path = %path.display(), records = records.len(), "Archive saved");
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("bad archive path: {}", path.display())))?;
    Ok(path.with_file_name(format!("{file_name}.tmp")))
}
