//! Append-only CSV result log — audit trail and dedup source.
//!
//! One file, one header row, one row per send attempt. Rows are never
//! updated or deleted. The same file feeds three readers: dedup snapshots
//! (Success rows), the dashboard results view, and the CSV export.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use gramreach_core::types::{Profile, ResultRecord, SendStatus};

use crate::csv;

/// Column headers of the result log.
pub const RESULTS_HEADER: [&str; 5] = ["Profile URL", "Status", "Message", "Timestamp", "Error"];

/// Append-only result log backed by a CSV file.
///
/// Appends never fail the caller: I/O errors are logged and swallowed so
/// a full disk can't abort a half-finished campaign. Cheap to clone;
/// clones share the same underlying file.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create parent directories and write the header row iff the file
    /// doesn't exist yet. Idempotent.
    pub fn initialize(&self) {
        if self.path.exists() {
            return;
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let header = csv::encode_row(&RESULTS_HEADER);
        if let Err(e) = std::fs::write(&self.path, header) {
            tracing::warn!("⚠️ Failed to initialize result log: {e}");
        }
    }

    /// Append one record. Errors are logged, never returned.
    pub fn append(&self, record: &ResultRecord) {
        let row = csv::encode_row(&[
            record.profile.as_str(),
            record.status.as_str(),
            &record.message,
            &record.timestamp,
            &record.error,
        ]);
        let result = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(row.as_bytes()));
        if let Err(e) = result {
            tracing::warn!("⚠️ Failed to record result for {}: {e}", record.profile);
        }
    }

    /// Profiles with at least one Success row.
    ///
    /// A missing or unreadable file yields an empty set: dedup degrades to
    /// "nothing sent yet" rather than blocking the run.
    pub fn successful_profiles(&self) -> HashSet<Profile> {
        let mut sent = HashSet::new();
        for record in self.all_records() {
            if record.status == SendStatus::Success {
                sent.insert(record.profile);
            }
        }
        sent
    }

    /// All parseable records in file order. Rows that don't parse are
    /// skipped with a warning.
    pub fn all_records(&self) -> Vec<ResultRecord> {
        if !self.path.exists() {
            return Vec::new();
        }
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("⚠️ Failed to read result log: {e}");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (i, row) in csv::parse(&text).into_iter().enumerate() {
            if i == 0 && row.first().map(String::as_str) == Some(RESULTS_HEADER[0]) {
                continue;
            }
            if row.len() != RESULTS_HEADER.len() {
                tracing::warn!("⚠️ Skipping malformed result row {}", i + 1);
                continue;
            }
            let profile = match Profile::parse(&row[0]) {
                Ok(p) => p,
                Err(_) => {
                    tracing::warn!("⚠️ Skipping result row {} with bad URL: {}", i + 1, row[0]);
                    continue;
                }
            };
            let Some(status) = SendStatus::parse(&row[1]) else {
                tracing::warn!("⚠️ Skipping result row {} with bad status: {}", i + 1, row[1]);
                continue;
            };
            records.push(ResultRecord {
                profile,
                status,
                message: row[2].clone(),
                timestamp: row[3].clone(),
                error: row[4].clone(),
            });
        }
        records
    }

    /// Raw file contents for download. Missing file yields an empty string.
    pub fn export_csv(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => String::new(),
        }
    }
}
