//! HTTP API for triggering runs and reading the last report.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::r#loop::{is_usable_name, Coordinator, RunRequest};
use crate::report::{ReportStore, RunResult};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Body of `POST /run-agent`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RunAgentRequest {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub max_retry: Option<u32>,
}

impl RunAgentRequest {
    /// Name of the first required field that is blank, or a name with no
    /// letters or digits to build a branch from.
    fn missing_field(&self) -> Option<&'static str> {
        if self.repo_url.trim().is_empty() {
            return Some("repo_url");
        }
        [("team_name", &self.team_name), ("leader_name", &self.leader_name)]
            .into_iter()
            .find(|(_, value)| !is_usable_name(value))
            .map(|(name, _)| name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub store: ReportStore,
}

impl AppState {
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let store = coordinator.store().clone();
        Self { coordinator, store }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/results", get(get_results))
        .route("/run-agent", post(run_agent))
        .with_state(Arc::new(state))
}

/// Bind and serve until the process exits.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(addr.as_str()).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// Handler functions

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn get_results(State(state): State<Arc<AppState>>) -> Json<RunResult> {
    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || store.load_last()).await;
    match loaded {
        Ok(result) => Json(result),
        Err(e) => {
            warn!("Loading the last report failed: {}", e);
            Json(RunResult::placeholder())
        }
    }
}

async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunAgentRequest>,
) -> std::result::Result<Json<RunResult>, (StatusCode, Json<ErrorResponse>)> {
    if let Some(field) = req.missing_field() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: format!("{field} must not be empty"),
            }),
        ));
    }

    let request = RunRequest {
        repo_url: req.repo_url.trim().to_string(),
        team_name: req.team_name.trim().to_string(),
        leader_name: req.leader_name.trim().to_string(),
        max_retry: req.max_retry,
    };
    Ok(Json(state.coordinator.run(request).await))
}
