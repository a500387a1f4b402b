//! Scheduled task definitions — the data model for recurring campaigns.

use std::path::PathBuf;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gramreach_core::error::{GramReachError, Result};
use gramreach_core::types::CampaignConfig;

/// Wall-clock trigger format.
pub const CLOCK_FORMAT: &str = "%H:%M";

/// A campaign that fires daily at a fixed local wall-clock minute.
///
/// Identified by a stable uuid so entries with the same time can be
/// removed individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task ID.
    pub id: String,
    /// Local trigger time, always stored as zero-padded `HH:MM`.
    pub time: String,
    /// Campaign settings used for every triggered run.
    pub config: CampaignConfig,
    /// Profile list re-read at trigger time.
    pub profiles_file: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Last triggered timestamp.
    pub last_run: Option<DateTime<Utc>>,
    /// How many times this task has run.
    pub run_count: u32,
}

impl ScheduledTask {
    /// Build a new task with a fresh id. Rejects malformed trigger times
    /// and configs that could not drive a run.
    pub fn new(
        time: &str,
        config: CampaignConfig,
        profiles_file: impl Into<PathBuf>,
    ) -> Result<Self> {
        let time = normalize_clock_time(time)?;
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            time,
            config,
            profiles_file: profiles_file.into(),
            created_at: Utc::now(),
            last_run: None,
            run_count: 0,
        })
    }

    /// Whether this task triggers at the given `HH:MM` minute.
    pub fn is_due(&self, clock: &str) -> bool {
        self.time == clock
    }
}

/// Parse and re-format a trigger time so stored values always read
/// zero-padded `HH:MM` ("9:05" becomes "09:05") and match the worker's
/// clock string exactly.
pub fn normalize_clock_time(raw: &str) -> Result<String> {
    let parsed = NaiveTime::parse_from_str(raw.trim(), CLOCK_FORMAT).map_err(|_| {
        GramReachError::Validation(format!("Invalid schedule time (expected HH:MM): {raw}"))
    })?;
    Ok(parsed.format(CLOCK_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> CampaignConfig {
        CampaignConfig {
            username: "user".into(),
            password: "pass".into(),
            message: "hello".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_clock_time() {
        assert_eq!(normalize_clock_time("09:30").unwrap(), "09:30");
        assert_eq!(normalize_clock_time("9:5").unwrap(), "09:05");
        assert_eq!(normalize_clock_time(" 23:59 ").unwrap(), "23:59");

        assert!(normalize_clock_time("24:00").is_err());
        assert!(normalize_clock_time("12:60").is_err());
        assert!(normalize_clock_time("soon").is_err());
        assert!(normalize_clock_time("").is_err());
    }

    #[test]
    fn test_new_task_gets_unique_id_and_normalized_time() {
        let a = ScheduledTask::new("9:05", campaign(), "profiles.csv").unwrap();
        let b = ScheduledTask::new("9:05", campaign(), "profiles.csv").unwrap();
        assert_eq!(a.time, "09:05");
        assert_ne!(a.id, b.id);
        assert_eq!(a.run_count, 0);
        assert!(a.last_run.is_none());
    }

    #[test]
    fn test_new_task_rejects_invalid_config() {
        let mut cfg = campaign();
        cfg.message = String::new();
        assert!(ScheduledTask::new("09:00", cfg, "profiles.csv").is_err());
    }

    #[test]
    fn test_is_due_exact_match_only() {
        let task = ScheduledTask::new("09:00", campaign(), "profiles.csv").unwrap();
        assert!(task.is_due("09:00"));
        assert!(!task.is_due("09:01"));
        assert!(!task.is_due("9:00"));
    }
}
