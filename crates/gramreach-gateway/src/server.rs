//! HTTP server — shared state, routing, and scheduled-run execution.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gramreach_campaign::{ProgressTracker, RunHandle};
use gramreach_core::config::{GramReachConfig, WebDriverConfig};
use gramreach_core::error::Result;
use gramreach_core::types::RunSummary;
use gramreach_scheduler::{ScheduledTask, TaskScheduler};
use gramreach_session::InstagramSession;
use gramreach_store::{ResultLog, load_profiles_file};

/// Shared state for the gateway server.
pub struct AppState {
    pub config: GramReachConfig,
    pub log: ResultLog,
    pub scheduler: TaskScheduler,
    /// The dashboard-launched campaign, if one was started.
    pub active_run: tokio::sync::Mutex<Option<RunHandle>>,
}

/// Run one scheduled campaign end to end: re-read the profile list, open
/// a fresh browser session, drive the runner.
async fn run_scheduled(
    task: ScheduledTask,
    webdriver: WebDriverConfig,
    log: ResultLog,
) -> Result<RunSummary> {
    let profiles = load_profiles_file(&task.profiles_file)?;
    let mut session = InstagramSession::open(&webdriver).await?;
    let (mut progress, _rx) =
        ProgressTracker::channel(profiles.len() as u32, task.config.max_messages);
    let cancel = AtomicBool::new(false);
    Ok(gramreach_campaign::run(
        &mut session,
        &profiles,
        &task.config,
        &log,
        &cancel,
        &mut progress,
    )
    .await)
}

/// Build the Axum router with all routes.
pub fn build_router(shared: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/campaign/start", post(super::routes::campaign_start))
        .route(
            "/api/v1/campaign/status",
            get(super::routes::campaign_status),
        )
        .route("/api/v1/campaign/stop", post(super::routes::campaign_stop))
        .route("/api/v1/schedules", get(super::routes::schedules_list))
        .route("/api/v1/schedules", post(super::routes::schedules_add))
        .route(
            "/api/v1/schedules/{id}",
            delete(super::routes::schedules_remove),
        )
        .route("/api/v1/results", get(super::routes::results_list))
        .route("/api/v1/results/export", get(super::routes::results_export))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Permissive by default; restrict origins in production via
/// GRAMREACH_CORS_ORIGINS (comma-separated).
fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    if let Ok(origins_str) = std::env::var("GRAMREACH_CORS_ORIGINS") {
        let origins: Vec<_> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins)
    } else {
        cors.allow_origin(Any)
    }
}

/// Start the HTTP server and the scheduler worker.
pub async fn start(config: GramReachConfig) -> anyhow::Result<()> {
    config.ensure_dirs()?;
    let log = ResultLog::new(config.results_file());
    log.initialize();

    let webdriver = config.webdriver.clone();
    let sched_log = log.clone();
    let scheduler = TaskScheduler::new(&config.scheduler_dir(), move |task: ScheduledTask| {
        run_scheduled(task, webdriver.clone(), sched_log.clone())
    });
    scheduler.start();

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState {
        config,
        log,
        scheduler,
        active_run: tokio::sync::Mutex::new(None),
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use gramreach_core::types::StopReason;

    fn test_state(name: &str) -> Arc<AppState> {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        let mut config = GramReachConfig::default();
        config.data_dir = dir.join("data").display().to_string();
        let log = ResultLog::new(config.results_file());
        let scheduler = TaskScheduler::new(&dir.join("scheduler"), |_task| async {
            Ok(RunSummary {
                sent: 0,
                reason: StopReason::Completed,
            })
        });
        Arc::new(AppState {
            config,
            log,
            scheduler,
            active_run: tokio::sync::Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let app = build_router(test_state("gramreach-test-srv-health"));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_resolves_schedule_delete() {
        let app = build_router(test_state("gramreach-test-srv-delete"));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/schedules/no-such-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // Route resolves; the unknown id just reports ok=false.
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
