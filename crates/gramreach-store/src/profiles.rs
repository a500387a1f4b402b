//! Profile list parsing — delimited uploads with a `URL` column.

use std::path::Path;

use gramreach_core::error::{GramReachError, Result};
use gramreach_core::types::Profile;

use crate::csv;

/// Parse a delimited upload into an ordered profile list.
///
/// The header row must contain a column named exactly `URL`; other
/// columns are ignored. Blank cells are dropped, cells that aren't
/// Instagram profile URLs are dropped with a log line, duplicates are
/// kept. List order is preserved.
pub fn load_profiles(text: &str) -> Result<Vec<Profile>> {
    let mut rows = csv::parse(text).into_iter();
    let header = rows
        .next()
        .ok_or_else(|| GramReachError::Validation("Profile file is empty".into()))?;
    let url_col = header
        .iter()
        .position(|h| h.trim() == "URL")
        .ok_or_else(|| {
            GramReachError::Validation("Profile file must contain a 'URL' column".into())
        })?;

    let mut profiles = Vec::new();
    for row in rows {
        let Some(cell) = row.get(url_col) else {
            continue;
        };
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        match Profile::parse(cell) {
            Ok(p) => profiles.push(p),
            Err(_) => tracing::debug!("Skipping non-Instagram URL: {cell}"),
        }
    }

    if profiles.is_empty() {
        return Err(GramReachError::Validation(
            "No valid Instagram profile URLs found in the file".into(),
        ));
    }
    Ok(profiles)
}

/// Load a profile list from a file. Scheduled runs re-read their file at
/// trigger time, so edits between firings take effect.
pub fn load_profiles_file(path: &Path) -> Result<Vec<Profile>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        GramReachError::Store(format!(
            "Failed to read profile file {}: {e}",
            path.display()
        ))
    })?;
    load_profiles(&text)
}
