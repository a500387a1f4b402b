//! # GramReach Core
//!
//! Shared foundation for the GramReach workspace: error taxonomy, domain
//! types, the `Messenger` trait that seams the campaign loop from the
//! browser session, and the toml configuration system.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::GramReachConfig;
pub use error::{GramReachError, Result, SendError, SendResult};
pub use traits::Messenger;
pub use types::{
    CampaignConfig, Profile, ResultRecord, RunProgress, RunSummary, SendStatus, StopReason,
};
