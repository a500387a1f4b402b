//! Error types for GramReach.

use thiserror::Error;

/// Top-level error type used across all GramReach crates.
#[derive(Error, Debug)]
pub enum GramReachError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, GramReachError>;

/// Why a single send attempt failed.
///
/// Recorded per profile and never aborts the run. Distinct from
/// [`GramReachError`] so callers can't confuse a dead session with a
/// profile that simply has no Message button.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No selector matched within the wait budget.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// The driver did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Navigating to the profile URL failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The session was not in a state that allows sending.
    #[error("unexpected session state: {0}")]
    UnexpectedState(String),

    /// Any other error reported by the WebDriver endpoint.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Outcome of one send attempt.
pub type SendResult = std::result::Result<(), SendError>;
