use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    clients::health::HealthChecker,
    models::{candidate::NotificationKind, health::HealthStatus, response::ApiResponse},
    pipeline::engine::{NotificationPipeline, RunReport},
};

/// One lock per workflow: overlapping triggers for the same workflow run one
/// at a time so cursor reads and writes stay ordered, while distinct
/// workflows still run concurrently.
#[derive(Default)]
struct RunLocks {
    join: Mutex<()>,
    visit_reminder: Mutex<()>,
    pregnancy_gap: Mutex<()>,
}

impl RunLocks {
    fn for_kind(&self, kind: NotificationKind) -> &Mutex<()> {
        match kind {
            NotificationKind::Join => &self.join,
            NotificationKind::VisitReminder => &self.visit_reminder,
            NotificationKind::PregnancyGap => &self.pregnancy_gap,
        }
    }
}

pub struct AppState {
    pipeline: NotificationPipeline,
    health_checker: HealthChecker,
    run_locks: RunLocks,
}

impl AppState {
    pub fn new(pipeline: NotificationPipeline, health_checker: HealthChecker) -> Self {
        Self {
            pipeline,
            health_checker,
            run_locks: RunLocks::default(),
        }
    }
}

pub async fn run_api_server(
    server_port: u16,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/workflows/{kind}/run", post(trigger_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Runs one workflow to completion and reports per-source results. The
/// response is 200 even when a source failed; the report carries the detail.
async fn trigger_workflow(
    State(state): State<Arc<AppState>>,
    Path(kind_label): Path<String>,
) -> impl IntoResponse {
    let Some(kind) = NotificationKind::from_str(&kind_label) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<RunReport>::error(
                format!("Unknown workflow '{}'", kind_label),
                "Workflow trigger rejected".to_string(),
            )),
        );
    };

    let _guard = state.run_locks.for_kind(kind).lock().await;

    let report = state.pipeline.run(kind).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            report,
            "Workflow run completed".to_string(),
        )),
    )
}
