//! GramReach configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::CampaignConfig;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GramReachConfig {
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    #[serde(default)]
    pub sending: SendingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Where profile uploads and the result log live.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String { "~/.gramreach/data".into() }

impl Default for GramReachConfig {
    fn default() -> Self {
        Self {
            webdriver: WebDriverConfig::default(),
            sending: SendingConfig::default(),
            gateway: GatewayConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl GramReachConfig {
    /// Load config from the default path (~/.gramreach/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::GramReachError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::GramReachError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::GramReachError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the GramReach home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gramreach")
    }

    /// Data directory with `~` expanded.
    pub fn resolve_data_dir(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }

    /// Where profile uploads are kept.
    pub fn input_dir(&self) -> PathBuf {
        self.resolve_data_dir().join("input")
    }

    /// Where the result log lives.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_data_dir().join("output")
    }

    /// Path of the append-only result log.
    pub fn results_file(&self) -> PathBuf {
        self.output_dir().join("message_results.csv")
    }

    /// Where scheduled tasks are persisted.
    pub fn scheduler_dir(&self) -> PathBuf {
        Self::home_dir().join("scheduler")
    }

    /// Create the data directories if they don't exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.input_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        Ok(())
    }
}

fn expand_tilde(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(p)
    }
}

/// WebDriver endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverConfig {
    /// Base URL of a running WebDriver server (chromedriver).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub headless: bool,
    /// User agent presented by the browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// How long to wait for an element before giving up, in seconds.
    #[serde(default = "default_element_wait")]
    pub element_wait_secs: u64,
}

fn default_endpoint() -> String { "http://localhost:9515".into() }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36"
        .into()
}
fn default_element_wait() -> u64 { 20 }

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            headless: false,
            user_agent: default_user_agent(),
            element_wait_secs: default_element_wait(),
        }
    }
}

/// Default pacing applied to new campaigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_time_interval")]
    pub time_interval_secs: u64,
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_mins: u64,
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_mins: u64,
    #[serde(default = "default_message_delay")]
    pub message_delay_secs: (f64, f64),
}

fn default_max_messages() -> u32 { 48 }
fn default_time_interval() -> u64 { 600 }
fn default_cooldown_min() -> u64 { 5 }
fn default_cooldown_max() -> u64 { 15 }
fn default_message_delay() -> (f64, f64) { (10.0, 30.0) }

impl Default for SendingConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            time_interval_secs: default_time_interval(),
            cooldown_min_mins: default_cooldown_min(),
            cooldown_max_mins: default_cooldown_max(),
            message_delay_secs: default_message_delay(),
        }
    }
}

impl SendingConfig {
    /// Build a campaign config from these pacing defaults.
    pub fn to_campaign(&self, username: &str, password: &str, message: &str) -> CampaignConfig {
        CampaignConfig {
            username: username.to_string(),
            password: password.to_string(),
            message: message.to_string(),
            max_messages: self.max_messages,
            time_interval_secs: self.time_interval_secs,
            cooldown_min_mins: self.cooldown_min_mins,
            cooldown_max_mins: self.cooldown_max_mins,
            message_delay_secs: self.message_delay_secs,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}
