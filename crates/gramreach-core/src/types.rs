//! Core domain types shared across GramReach crates.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::{GramReachError, Result};

/// URL prefixes accepted as Instagram profile links.
pub const PROFILE_PREFIXES: [&str; 2] = ["https://www.instagram.com/", "instagram.com/"];

/// Max characters of message text kept in a result row.
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Max characters of error text kept in a result row.
pub const MAX_ERROR_CHARS: usize = 200;
/// Timestamp format used in result rows (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Truncate a string to at most `max` characters (UTF-8 safe).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─── Profile ─────────────────────────────────────────────────────────────

/// A validated Instagram profile URL.
///
/// Valid iff the raw string starts with one of [`PROFILE_PREFIXES`].
/// The inner string is kept exactly as supplied (after trimming), so the
/// audit log records what the operator uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(String);

impl Profile {
    /// Parse a raw cell into a profile URL.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GramReachError::Validation("Empty profile URL".into()));
        }
        if PROFILE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(GramReachError::Validation(format!(
                "Not an Instagram profile URL: {trimmed}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL with a scheme, suitable for browser navigation.
    pub fn navigable_url(&self) -> String {
        if self.0.starts_with("https://") {
            self.0.clone()
        } else {
            format!("https://www.{}", self.0)
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Send outcomes ───────────────────────────────────────────────────────

/// Outcome class of one send attempt, as recorded in the result log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    Success,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Success" => Some(Self::Success),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One audit row: the outcome of a single send attempt.
///
/// Immutable once appended to the result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub profile: Profile,
    pub status: SendStatus,
    pub message: String,
    /// Local time, formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Empty on success.
    pub error: String,
}

impl ResultRecord {
    /// Build a record stamped with the current local time.
    /// Message and error text are truncated to the log limits.
    pub fn new(profile: Profile, status: SendStatus, message: &str, error: &str) -> Self {
        Self {
            profile,
            status,
            message: truncate_chars(message, MAX_MESSAGE_CHARS).to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            error: truncate_chars(error, MAX_ERROR_CHARS).to_string(),
        }
    }
}

// ─── Campaign settings ───────────────────────────────────────────────────

/// Settings for one campaign run. Passed by value into the runner; edits
/// made while a run is in flight do not affect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub username: String,
    pub password: String,
    /// Message text sent to every profile.
    pub message: String,
    /// Per-run send cap.
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Elapsed sending time that triggers a cooldown, in seconds.
    #[serde(default = "default_time_interval")]
    pub time_interval_secs: u64,
    /// Cooldown lower bound, in minutes.
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_mins: u64,
    /// Cooldown upper bound, in minutes.
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_mins: u64,
    /// Min/max delay after each attempted profile, in seconds.
    #[serde(default = "default_message_delay")]
    pub message_delay_secs: (f64, f64),
}

fn default_max_messages() -> u32 { 48 }
fn default_time_interval() -> u64 { 600 }
fn default_cooldown_min() -> u64 { 5 }
fn default_cooldown_max() -> u64 { 15 }
fn default_message_delay() -> (f64, f64) { (10.0, 30.0) }

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            message: String::new(),
            max_messages: default_max_messages(),
            time_interval_secs: default_time_interval(),
            cooldown_min_mins: default_cooldown_min(),
            cooldown_max_mins: default_cooldown_max(),
            message_delay_secs: default_message_delay(),
        }
    }
}

impl CampaignConfig {
    /// Check that the config can actually drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(GramReachError::Validation("Username is required".into()));
        }
        if self.password.is_empty() {
            return Err(GramReachError::Validation("Password is required".into()));
        }
        if self.message.trim().is_empty() {
            return Err(GramReachError::Validation("Message text is required".into()));
        }
        if self.max_messages == 0 {
            return Err(GramReachError::Validation(
                "max_messages must be at least 1".into(),
            ));
        }
        if self.cooldown_min_mins > self.cooldown_max_mins {
            return Err(GramReachError::Validation(
                "Cooldown minimum exceeds maximum".into(),
            ));
        }
        let (dmin, dmax) = self.message_delay_secs;
        if dmin < 0.0 || dmin > dmax {
            return Err(GramReachError::Validation(
                "Invalid message delay range".into(),
            ));
        }
        Ok(())
    }
}

// ─── Run accounting ──────────────────────────────────────────────────────

/// Why a campaign run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every profile in the list was processed.
    Completed,
    /// The per-run send cap was reached.
    LimitReached,
    /// The cancellation flag was observed between profiles.
    Cancelled,
    /// Login failed. Nothing was sent or recorded.
    AuthFailed,
}

/// Final accounting for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sent: u32,
    pub reason: StopReason,
}

/// Point-in-time snapshot published while a campaign runs.
///
/// `attempted` counts profiles actually driven through the session;
/// `skipped` counts profiles dropped by the dedup snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub attempted: u32,
    pub sent: u32,
    pub skipped: u32,
    /// Profiles in the uploaded list.
    pub total: u32,
    /// The per-run send cap in force.
    pub limit: u32,
    /// Set exactly once, when the run finishes.
    pub done: Option<StopReason>,
}

impl RunProgress {
    /// Snapshot published before the first attempt.
    pub fn starting(total: u32, limit: u32) -> Self {
        Self {
            attempted: 0,
            sent: 0,
            skipped: 0,
            total,
            limit,
            done: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse_accepts_instagram_urls() {
        let p = Profile::parse("https://www.instagram.com/someuser").unwrap();
        assert_eq!(p.as_str(), "https://www.instagram.com/someuser");

        let p = Profile::parse("  instagram.com/other ").unwrap();
        assert_eq!(p.as_str(), "instagram.com/other");
    }

    #[test]
    fn test_profile_parse_rejects_foreign_urls() {
        assert!(Profile::parse("https://twitter.com/someuser").is_err());
        assert!(Profile::parse("http://www.instagram.com/user").is_err());
        assert!(Profile::parse("").is_err());
        assert!(Profile::parse("   ").is_err());
    }

    #[test]
    fn test_profile_navigable_url() {
        let p = Profile::parse("instagram.com/user").unwrap();
        assert_eq!(p.navigable_url(), "https://www.instagram.com/user");

        let p = Profile::parse("https://www.instagram.com/user").unwrap();
        assert_eq!(p.navigable_url(), "https://www.instagram.com/user");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("xin chào các bạn", 9), "xin chào ");
    }

    #[test]
    fn test_result_record_truncates() {
        let p = Profile::parse("instagram.com/u").unwrap();
        let long_msg = "a".repeat(600);
        let long_err = "e".repeat(300);
        let rec = ResultRecord::new(p, SendStatus::Failed, &long_msg, &long_err);
        assert_eq!(rec.message.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(rec.error.chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn test_send_status_round_trip() {
        assert_eq!(SendStatus::parse("Success"), Some(SendStatus::Success));
        assert_eq!(SendStatus::parse("Failed"), Some(SendStatus::Failed));
        assert_eq!(SendStatus::parse("success"), None);
        assert_eq!(SendStatus::Success.as_str(), "Success");
    }

    #[test]
    fn test_campaign_config_defaults() {
        let cfg = CampaignConfig::default();
        assert_eq!(cfg.max_messages, 48);
        assert_eq!(cfg.time_interval_secs, 600);
        assert_eq!(cfg.cooldown_min_mins, 5);
        assert_eq!(cfg.cooldown_max_mins, 15);
        assert_eq!(cfg.message_delay_secs, (10.0, 30.0));
    }

    #[test]
    fn test_campaign_config_validation() {
        let mut cfg = CampaignConfig {
            username: "user".into(),
            password: "pass".into(),
            message: "hello".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());

        cfg.username = String::new();
        assert!(cfg.validate().is_err());
        cfg.username = "user".into();

        cfg.max_messages = 0;
        assert!(cfg.validate().is_err());
        cfg.max_messages = 10;

        cfg.cooldown_min_mins = 20;
        assert!(cfg.validate().is_err());
    }
}
