//! W3C WebDriver wire-protocol client — drives a browser through a
//! running driver endpoint (chromedriver) over HTTP.
//!
//! Only the handful of commands the Instagram flow needs: session
//! lifecycle, navigation, XPath element lookup, click, keystrokes, and
//! script execution. Element lookups retry on a fixed backoff schedule
//! against a bounded deadline; no other command retries.

use std::time::Duration;

use gramreach_core::config::WebDriverConfig;
use gramreach_core::error::{GramReachError, Result, SendError};

/// Element identifier key in W3C responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Code point the WebDriver protocol maps to the Enter key.
pub const ENTER_KEY: char = '\u{e007}';

/// Delay before each element re-lookup. Escalates through the schedule,
/// then stays at the last entry until the deadline runs out.
const LOOKUP_BACKOFF_MS: [u64; 4] = [250, 500, 1_000, 2_000];

/// Per-command HTTP timeout. Navigation against a slow page is the
/// longest call we make.
const COMMAND_TIMEOUT_SECS: u64 = 60;

type DriverResult<T> = std::result::Result<T, SendError>;

/// One driving session against a WebDriver server.
pub struct DriverClient {
    config: WebDriverConfig,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl DriverClient {
    pub fn new(config: WebDriverConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            session_id: None,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn session_path(&self, suffix: &str) -> DriverResult<String> {
        let id = self
            .session_id
            .as_ref()
            .ok_or_else(|| SendError::UnexpectedState("no active browser session".into()))?;
        if suffix.is_empty() {
            Ok(format!("session/{id}"))
        } else {
            Ok(format!("session/{id}/{suffix}"))
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Capabilities payload for a new Chrome session: stability switches,
    /// notification/image prefs, custom user agent, optional headless.
    fn capabilities(&self) -> serde_json::Value {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-agent={}", self.config.user_agent),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
            args.push("--window-size=1920,1080".to_string());
        }
        serde_json::json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "profile.default_content_setting_values.notifications": 2,
                            "profile.managed_default_content_settings.images": 2,
                            "profile.managed_default_content_settings.javascript": 1,
                        }
                    }
                }
            }
        })
    }

    /// Open a new browser session.
    pub async fn start_session(&mut self) -> Result<()> {
        let value = self
            .post("session", self.capabilities())
            .await
            .map_err(|e| GramReachError::Session(format!("Failed to start session: {e}")))?;

        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                GramReachError::Session("Driver returned no session id".into())
            })?;

        tracing::info!("🌐 Browser session started: {session_id}");
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Navigate the browser to a URL.
    pub async fn goto(&self, url: &str) -> DriverResult<()> {
        let path = self.session_path("url")?;
        self.post(&path, serde_json::json!({ "url": url }))
            .await
            .map_err(|e| match e {
                SendError::Timeout(m) => SendError::Timeout(m),
                other => SendError::Navigation(other.to_string()),
            })?;
        Ok(())
    }

    /// Locate one element by XPath. Single shot, no waiting.
    pub async fn find_element(&self, xpath: &str) -> DriverResult<String> {
        let path = self.session_path("element")?;
        let value = self
            .post(
                &path,
                serde_json::json!({ "using": "xpath", "value": xpath }),
            )
            .await?;
        value
            .get(ELEMENT_KEY)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| SendError::Driver("Malformed element response".into()))
    }

    /// Locate one element by XPath, retrying until `timeout` elapses.
    ///
    /// Only "no such element" is retried; any other driver error is
    /// returned immediately.
    pub async fn wait_for_element(&self, xpath: &str, timeout: Duration) -> DriverResult<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut attempt = 0usize;
        loop {
            match self.find_element(xpath).await {
                Ok(id) => return Ok(id),
                Err(SendError::ElementNotFound(_)) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SendError::ElementNotFound(format!(
                            "no match for {xpath} within {}s",
                            timeout.as_secs()
                        )));
                    }
                    tokio::time::sleep(lookup_backoff(attempt)).await;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Click an element.
    pub async fn click(&self, element_id: &str) -> DriverResult<()> {
        let path = self.session_path(&format!("element/{element_id}/click"))?;
        self.post(&path, serde_json::json!({})).await?;
        Ok(())
    }

    /// Send keystrokes to an element.
    pub async fn send_keys(&self, element_id: &str, text: &str) -> DriverResult<()> {
        let path = self.session_path(&format!("element/{element_id}/value"))?;
        self.post(&path, serde_json::json!({ "text": text })).await?;
        Ok(())
    }

    /// Execute a synchronous script in the page.
    pub async fn execute(&self, script: &str) -> DriverResult<serde_json::Value> {
        let path = self.session_path("execute/sync")?;
        self.post(
            &path,
            serde_json::json!({ "script": script, "args": [] }),
        )
        .await
    }

    /// End the browser session. Idempotent; failures are logged only,
    /// because teardown runs on every exit path.
    pub async fn quit(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };
        let url = self.api_url(&format!("session/{id}"));
        match self
            .client
            .delete(&url)
            .timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(_) => tracing::info!("🌐 Browser session closed: {id}"),
            Err(e) => tracing::warn!("⚠️ Failed to close browser session {id}: {e}"),
        }
    }

    /// POST a command and return the decoded `value` payload.
    async fn post(&self, path: &str, body: serde_json::Value) -> DriverResult<serde_json::Value> {
        let response = self
            .client
            .post(self.api_url(path))
            .json(&body)
            .timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout(format!("WebDriver request timed out: {e}"))
                } else {
                    SendError::Driver(format!("WebDriver request failed: {e}"))
                }
            })?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SendError::Driver(format!("Invalid WebDriver response: {e}")))?;

        if !status.is_success() {
            return Err(decode_error(&payload));
        }
        Ok(payload.get("value").cloned().unwrap_or(serde_json::Value::Null))
    }
}

fn lookup_backoff(attempt: usize) -> Duration {
    let delay_ms = LOOKUP_BACKOFF_MS
        .get(attempt)
        .copied()
        .unwrap_or(LOOKUP_BACKOFF_MS[LOOKUP_BACKOFF_MS.len() - 1]);
    Duration::from_millis(delay_ms)
}

/// Decode a W3C error body ({"value": {"error": ..., "message": ...}})
/// into the send-failure taxonomy.
fn decode_error(payload: &serde_json::Value) -> SendError {
    let value = payload.get("value");
    let code = value
        .and_then(|v| v.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error");
    let message = value
        .and_then(|v| v.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match code {
        "no such element" | "stale element reference" => {
            SendError::ElementNotFound(format!("{code}: {message}"))
        }
        "timeout" | "script timeout" => SendError::Timeout(format!("{code}: {message}")),
        _ => SendError::Driver(format!("{code}: {message}")),
    }
}
