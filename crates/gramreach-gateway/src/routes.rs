//! Gateway route handlers — JSON in, JSON out.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use gramreach_campaign::spawn_campaign;
use gramreach_core::types::CampaignConfig;
use gramreach_scheduler::ScheduledTask;
use gramreach_session::InstagramSession;
use gramreach_store::load_profiles;

use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gramreach-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn err(status: StatusCode, msg: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!({"ok": false, "error": msg.to_string()})),
    )
}

/// Build a campaign config from a request body. Pacing fields the form
/// omits fall back to the configured defaults.
fn campaign_from_body(state: &AppState, body: &serde_json::Value) -> CampaignConfig {
    let mut config = state.config.sending.to_campaign(
        body["username"].as_str().unwrap_or("").trim(),
        body["password"].as_str().unwrap_or(""),
        body["message"].as_str().unwrap_or(""),
    );
    if let Some(n) = body["max_messages"].as_u64() {
        config.max_messages = n as u32;
    }
    if let Some(n) = body["time_interval_secs"].as_u64() {
        config.time_interval_secs = n;
    }
    if let Some(n) = body["cooldown_min_mins"].as_u64() {
        config.cooldown_min_mins = n;
    }
    if let Some(n) = body["cooldown_max_mins"].as_u64() {
        config.cooldown_max_mins = n;
    }
    config
}

// ---- Campaign API ----

/// Launch a campaign from the dashboard form.
///
/// 400 on an invalid form or upload, 409 while a dashboard campaign is
/// already in flight, 502 if the browser session cannot be opened.
pub async fn campaign_start(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let config = campaign_from_body(&state, &body);
    if let Err(e) = config.validate() {
        return err(StatusCode::BAD_REQUEST, e);
    }
    let profiles = match load_profiles(body["profiles_csv"].as_str().unwrap_or("")) {
        Ok(p) => p,
        Err(e) => return err(StatusCode::BAD_REQUEST, e),
    };

    // The lock is held until the run is registered, so two overlapping
    // start requests cannot both pass the in-flight check.
    let mut active = state.active_run.lock().await;
    if active.as_ref().is_some_and(|run| !run.is_finished()) {
        return err(StatusCode::CONFLICT, "A campaign is already running");
    }

    let session = match InstagramSession::open(&state.config.webdriver).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("❌ Could not open browser session: {e}");
            return err(StatusCode::BAD_GATEWAY, e);
        }
    };

    let total = profiles.len();
    let limit = config.max_messages;
    *active = Some(spawn_campaign(session, profiles, config, state.log.clone()));
    tracing::info!("🚀 Campaign launched from dashboard: {total} profiles");
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "profiles": total, "limit": limit})),
    )
}

/// Latest progress snapshot of the dashboard-launched campaign.
pub async fn campaign_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let active = state.active_run.lock().await;
    match active.as_ref() {
        Some(run) => {
            let progress = run.latest();
            Json(serde_json::json!({
                "ok": true,
                "running": progress.done.is_none(),
                "progress": progress,
            }))
        }
        None => Json(serde_json::json!({"ok": true, "running": false, "progress": null})),
    }
}

/// Ask the running campaign to stop. It finishes its current profile
/// first.
pub async fn campaign_stop(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let active = state.active_run.lock().await;
    match active.as_ref() {
        Some(run) if !run.is_finished() => {
            run.cancel();
            tracing::info!("🛑 Stop requested from dashboard");
            Json(serde_json::json!({"ok": true}))
        }
        _ => Json(serde_json::json!({"ok": false, "error": "No campaign is running"})),
    }
}

// ---- Schedules API ----

/// List all scheduled campaigns. Passwords never leave the server.
pub async fn schedules_list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let schedules: Vec<_> = state
        .scheduler
        .list_tasks()
        .iter()
        .map(|t| {
            serde_json::json!({
                "id": t.id,
                "time": t.time,
                "username": t.config.username,
                "message": t.config.message,
                "max_messages": t.config.max_messages,
                "profiles_file": t.profiles_file.display().to_string(),
                "created_at": t.created_at.to_rfc3339(),
                "last_run": t.last_run.map(|d| d.to_rfc3339()),
                "run_count": t.run_count,
            })
        })
        .collect();
    Json(serde_json::json!({"ok": true, "schedules": schedules, "count": schedules.len()}))
}

/// Add a scheduled campaign.
pub async fn schedules_add(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let config = campaign_from_body(&state, &body);
    if let Err(e) = config.validate() {
        return err(StatusCode::BAD_REQUEST, e);
    }
    let profiles_file = body["profiles_file"].as_str().unwrap_or("");
    if profiles_file.is_empty() {
        return err(StatusCode::BAD_REQUEST, "A profiles_file path is required");
    }
    if !std::path::Path::new(profiles_file).exists() {
        return err(
            StatusCode::BAD_REQUEST,
            format!("Profiles file not found: {profiles_file}"),
        );
    }

    let time = body["time"].as_str().unwrap_or("");
    let task = match ScheduledTask::new(time, config, profiles_file) {
        Ok(t) => t,
        Err(e) => return err(StatusCode::BAD_REQUEST, e),
    };
    let id = task.id.clone();
    if let Err(e) = state.scheduler.add_task(task) {
        return err(StatusCode::INTERNAL_SERVER_ERROR, e);
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "id": id})),
    )
}

/// Remove a scheduled campaign by id.
pub async fn schedules_remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    let removed = state.scheduler.remove_task(&id);
    Json(serde_json::json!({"ok": removed}))
}

// ---- Results API ----

/// All result rows as JSON.
pub async fn results_list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let records = state.log.all_records();
    Json(serde_json::json!({"ok": true, "results": records, "count": records.len()}))
}

/// The raw result log as a CSV download.
pub async fn results_export(State(state): State<Arc<AppState>>) -> Response {
    let csv = state.log.export_csv();
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"instagram_message_results.csv\"",
            ),
        ],
        csv,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::AppState;

    use gramreach_core::config::GramReachConfig;
    use gramreach_core::error::{Result, SendResult};
    use gramreach_core::traits::Messenger;
    use gramreach_core::types::{Profile, ResultRecord, RunSummary, SendStatus, StopReason};
    use gramreach_scheduler::TaskScheduler;
    use gramreach_store::ResultLog;

    fn test_state(name: &str) -> State<Arc<AppState>> {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        let mut config = GramReachConfig::default();
        config.data_dir = dir.join("data").display().to_string();
        // Nothing listens here; session opens must fail fast.
        config.webdriver.endpoint = "http://127.0.0.1:59999".into();
        let log = ResultLog::new(config.results_file());
        let scheduler = TaskScheduler::new(&dir.join("scheduler"), |_task| async {
            Ok(RunSummary {
                sent: 0,
                reason: StopReason::Completed,
            })
        });
        State(Arc::new(AppState {
            config,
            log,
            scheduler,
            active_run: tokio::sync::Mutex::new(None),
        }))
    }

    fn write_profiles_file(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("profiles.csv");
        std::fs::write(&file, "URL\nhttps://www.instagram.com/alice\n").unwrap();
        file
    }

    /// A messenger that never finishes its send, to keep a run "active".
    struct StalledMessenger;

    #[async_trait::async_trait]
    impl Messenger for StalledMessenger {
        async fn login(&mut self, _username: &str, _password: &str) -> Result<()> {
            Ok(())
        }
        async fn send_message(&mut self, _profile: &Profile, _text: &str) -> SendResult {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        }
        fn is_authenticated(&self) -> bool {
            true
        }
        async fn close(&mut self) {}
    }

    // ---- Health ----

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "gramreach-gateway");
    }

    // ---- Campaign ----

    #[tokio::test]
    async fn test_campaign_start_rejects_missing_fields() {
        let (status, Json(json)) = campaign_start(
            test_state("gramreach-test-gw-missing"),
            Json(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert!(json["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn test_campaign_start_rejects_empty_profile_upload() {
        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "profiles_csv": "URL\n",
        });
        let (status, Json(json)) =
            campaign_start(test_state("gramreach-test-gw-empty"), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("No valid Instagram"));
    }

    #[tokio::test]
    async fn test_campaign_start_fails_when_driver_unreachable() {
        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "profiles_csv": "URL\nhttps://www.instagram.com/alice\n",
        });
        let (status, Json(json)) =
            campaign_start(test_state("gramreach-test-gw-driver"), Json(body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["ok"], false);
    }

    #[tokio::test]
    async fn test_campaign_start_conflicts_while_running() {
        let state = test_state("gramreach-test-gw-conflict");
        let profiles = vec![Profile::parse("https://www.instagram.com/alice").unwrap()];
        let config = state.0.config.sending.to_campaign("user", "pass", "hello");
        let handle = spawn_campaign(StalledMessenger, profiles, config, state.0.log.clone());
        *state.0.active_run.lock().await = Some(handle);

        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "profiles_csv": "URL\nhttps://www.instagram.com/bob\n",
        });
        let (status, Json(json)) = campaign_start(state.clone(), Json(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("already running"));

        let json = campaign_status(state.clone()).await.0;
        assert_eq!(json["running"], true);
        assert_eq!(json["progress"]["total"], 1);

        // Stop flips the cancel flag on the stalled run.
        let json = campaign_stop(state).await.0;
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_campaign_status_idle() {
        let json = campaign_status(test_state("gramreach-test-gw-idle")).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["running"], false);
        assert!(json["progress"].is_null());
    }

    #[tokio::test]
    async fn test_campaign_stop_without_run() {
        let json = campaign_stop(test_state("gramreach-test-gw-stopidle")).await.0;
        assert_eq!(json["ok"], false);
    }

    // ---- Schedules ----

    #[tokio::test]
    async fn test_schedules_crud() {
        let state = test_state("gramreach-test-gw-schedules");
        let file = write_profiles_file("gramreach-test-gw-schedules");

        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "time": "9:30",
            "profiles_file": file.display().to_string(),
        });
        let (status, Json(json)) = schedules_add(state.clone(), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        let id = json["id"].as_str().unwrap().to_string();

        let json = schedules_list(state.clone()).await.0;
        assert_eq!(json["count"], 1);
        assert_eq!(json["schedules"][0]["id"], id.as_str());
        assert_eq!(json["schedules"][0]["time"], "09:30");
        // Credentials never leave the server.
        assert!(json["schedules"][0].get("password").is_none());

        let json = schedules_remove(state.clone(), Path(id.clone())).await.0;
        assert_eq!(json["ok"], true);
        let json = schedules_remove(state.clone(), Path(id)).await.0;
        assert_eq!(json["ok"], false);
        let json = schedules_list(state).await.0;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_schedules_add_rejects_bad_time() {
        let state = test_state("gramreach-test-gw-badtime");
        let file = write_profiles_file("gramreach-test-gw-badtime");
        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "time": "25:00",
            "profiles_file": file.display().to_string(),
        });
        let (status, Json(json)) = schedules_add(state, Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("HH:MM"));
    }

    #[tokio::test]
    async fn test_schedules_add_rejects_missing_file() {
        let state = test_state("gramreach-test-gw-nofile");
        let body = serde_json::json!({
            "username": "user", "password": "pass", "message": "hello",
            "time": "09:00",
            "profiles_file": "/no/such/gramreach-file.csv",
        });
        let (status, Json(json)) = schedules_add(state, Json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    // ---- Results ----

    #[tokio::test]
    async fn test_results_empty_shape() {
        let json = results_list(test_state("gramreach-test-gw-results")).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["count"], 0);
        assert!(json["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_export_is_csv_attachment() {
        let state = test_state("gramreach-test-gw-export");
        state.0.log.initialize();
        state.0.log.append(&ResultRecord::new(
            Profile::parse("https://www.instagram.com/alice").unwrap(),
            SendStatus::Success,
            "hi",
            "",
        ));

        let resp = results_export(state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert!(
            resp.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("instagram_message_results.csv")
        );

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("Profile URL,Status,Message,Timestamp,Error"));
        assert!(text.contains("instagram.com/alice"));
    }
}
