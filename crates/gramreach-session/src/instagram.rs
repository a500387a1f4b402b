//! Instagram messaging session — login flow, paced keystrokes, and the
//! send flow, scripted over the WebDriver client.
//!
//! State machine: Unauthenticated → Authenticated → Closed. Sending is
//! only legal while Authenticated; `close` is legal (and idempotent) from
//! every state.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use gramreach_core::config::WebDriverConfig;
use gramreach_core::error::{GramReachError, Result, SendError, SendResult};
use gramreach_core::traits::Messenger;
use gramreach_core::types::Profile;

use crate::selectors;
use crate::webdriver::{DriverClient, ENTER_KEY};

/// How long best-effort popup dismissal waits for its button.
const POPUP_WAIT_SECS: u64 = 5;

/// Per-selector wait when hunting the Message button.
const MESSAGE_BUTTON_WAIT_SECS: u64 = 10;

/// Script that hides the automation flag most bot checks probe first.
const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// Lifecycle state of a messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// A scripted Instagram browser session.
pub struct InstagramSession {
    driver: DriverClient,
    state: SessionState,
    element_wait: Duration,
}

impl InstagramSession {
    /// Open a browser session and apply the stealth script.
    pub async fn open(config: &WebDriverConfig) -> Result<Self> {
        let element_wait = Duration::from_secs(config.element_wait_secs);
        let mut driver = DriverClient::new(config.clone());
        driver.start_session().await?;

        if let Err(e) = driver.execute(STEALTH_SCRIPT).await {
            driver.quit().await;
            return Err(GramReachError::Session(format!(
                "Failed to apply stealth script: {e}"
            )));
        }

        Ok(Self {
            driver,
            state: SessionState::Unauthenticated,
            element_wait,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Type text one character at a time with human-like jitter.
    async fn type_like_human(&self, element_id: &str, text: &str) -> SendResult {
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.driver
                .send_keys(element_id, ch.encode_utf8(&mut buf))
                .await?;
            jitter_sleep(0.05, 0.2).await;
        }
        Ok(())
    }

    /// Best-effort dismissal of an overlay button. Absence is normal.
    async fn dismiss_prompt(&self, xpath: &str, label: &str) {
        let wait = Duration::from_secs(POPUP_WAIT_SECS);
        match self.driver.wait_for_element(xpath, wait).await {
            Ok(id) => {
                if let Err(e) = self.driver.click(&id).await {
                    tracing::debug!("Could not dismiss {label}: {e}");
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                tracing::debug!("Dismissed {label}");
            }
            Err(_) => tracing::debug!("No {label} shown"),
        }
    }

    /// Try each Message button selector in order.
    async fn click_message_button(&self) -> SendResult {
        let wait = Duration::from_secs(MESSAGE_BUTTON_WAIT_SECS);
        for selector in selectors::MESSAGE_BUTTONS {
            match self.driver.wait_for_element(selector, wait).await {
                Ok(id) => match self.driver.click(&id).await {
                    Ok(()) => {
                        jitter_sleep(1.0, 2.0).await;
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!("Message button click failed, trying next selector: {e}");
                    }
                },
                Err(e) => {
                    tracing::debug!("Message button selector missed: {e}");
                }
            }
        }
        Err(SendError::ElementNotFound("message button".into()))
    }
}

#[async_trait]
impl Messenger for InstagramSession {
    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(GramReachError::Session(
                "Cannot log in on a closed session".into(),
            ));
        }

        tracing::info!("Navigating to Instagram login page");
        self.driver
            .goto(selectors::LOGIN_URL)
            .await
            .map_err(auth_err)?;

        // Cookie consent shows for EU exits only.
        self.dismiss_prompt(selectors::COOKIE_ALLOW_BUTTON, "cookie consent")
            .await;

        let field = self
            .driver
            .wait_for_element(selectors::USERNAME_FIELD, self.element_wait)
            .await
            .map_err(auth_err)?;
        self.type_like_human(&field, username).await.map_err(auth_err)?;

        let field = self
            .driver
            .wait_for_element(selectors::PASSWORD_FIELD, self.element_wait)
            .await
            .map_err(auth_err)?;
        self.type_like_human(&field, password).await.map_err(auth_err)?;

        let submit = self
            .driver
            .wait_for_element(selectors::SUBMIT_BUTTON, self.element_wait)
            .await
            .map_err(auth_err)?;
        self.driver.click(&submit).await.map_err(auth_err)?;

        jitter_sleep(3.0, 5.0).await;

        self.dismiss_prompt(selectors::NOT_NOW_BUTTON, "save-login prompt")
            .await;
        self.dismiss_prompt(selectors::NOT_NOW_BUTTON, "notification prompt")
            .await;

        tracing::info!("✅ Logged in as {username}");
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn send_message(&mut self, profile: &Profile, text: &str) -> SendResult {
        match self.state {
            SessionState::Authenticated => {}
            SessionState::Unauthenticated => {
                return Err(SendError::UnexpectedState("not logged in".into()));
            }
            SessionState::Closed => {
                return Err(SendError::UnexpectedState("session closed".into()));
            }
        }

        tracing::info!("Messaging {profile}");
        self.driver.goto(&profile.navigable_url()).await?;
        jitter_sleep(2.0, 4.0).await;

        self.click_message_button().await?;

        let message_box = self
            .driver
            .wait_for_element(selectors::MESSAGE_BOX, self.element_wait)
            .await?;
        self.type_like_human(&message_box, text).await?;

        let mut buf = [0u8; 4];
        self.driver
            .send_keys(&message_box, ENTER_KEY.encode_utf8(&mut buf))
            .await?;
        jitter_sleep(1.0, 2.0).await;

        tracing::info!("✅ Message sent to {profile}");
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    async fn close(&mut self) {
        self.driver.quit().await;
        self.state = SessionState::Closed;
    }
}

fn auth_err(e: SendError) -> GramReachError {
    GramReachError::AuthFailed(e.to_string())
}

/// Sleep a uniformly random number of seconds in `[min, max]`.
async fn jitter_sleep(min: f64, max: f64) {
    let secs = { rand::thread_rng().gen_range(min..=max) };
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}
