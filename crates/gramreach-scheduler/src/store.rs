//! File-based schedule store — one human-readable JSON file.
//! Only written on task changes, never on ticks.

use std::path::{Path, PathBuf};

use gramreach_core::error::{GramReachError, Result};

use crate::tasks::ScheduledTask;

/// Persists the schedule list as `tasks.json` under a directory.
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.join("tasks.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save all tasks to disk.
    pub fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks)
            .map_err(|e| GramReachError::Scheduler(format!("Serialize error: {e}")))?;
        std::fs::write(&self.path, &json)
            .map_err(|e| GramReachError::Scheduler(format!("Write error: {e}")))?;
        tracing::debug!("💾 Saved {} scheduled tasks to {}", tasks.len(), self.path.display());
        Ok(())
    }

    /// Load tasks from disk. A missing, unreadable, or unparseable file
    /// yields an empty list with a warning; the scheduler must come up
    /// regardless.
    pub fn load(&self) -> Vec<ScheduledTask> {
        if !self.path.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse tasks.json: {e}");
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read tasks.json: {e}");
                Vec::new()
            }
        }
    }
}
