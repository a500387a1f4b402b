//! The `Messenger` trait — the seam between the campaign loop and the
//! browser session.

use async_trait::async_trait;

use crate::error::{Result, SendResult};
use crate::types::Profile;

/// A messaging backend the campaign loop can drive.
///
/// The production implementation scripts a browser over the WebDriver
/// protocol. Tests substitute a scripted double, so the loop's pacing,
/// dedup, and cancellation logic can be exercised without a browser.
#[async_trait]
pub trait Messenger: Send {
    /// Authenticate the session. Must succeed before any send.
    async fn login(&mut self, username: &str, password: &str) -> Result<()>;

    /// Send one message to one profile. A failed attempt is reported,
    /// never retried here.
    async fn send_message(&mut self, profile: &Profile, text: &str) -> SendResult;

    /// Whether login has succeeded and the session is usable.
    fn is_authenticated(&self) -> bool;

    /// Tear down the session. Idempotent and infallible: errors are
    /// logged by the implementation, never surfaced.
    async fn close(&mut self);
}
