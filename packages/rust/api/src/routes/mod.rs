//! Route tables, grouped by concern.

mod assist;
mod records;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

pub(crate) use assist::assist_routes;
pub(crate) use records::record_routes;

// ============================================================================
// Service Routes
// ============================================================================

#[derive(Debug, Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    web_search: bool,
}

pub(crate) fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "autoservice API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started.elapsed().as_secs(),
        web_search: state.agent.has_web_search(),
    })
}
