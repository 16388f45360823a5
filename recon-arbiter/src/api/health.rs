//! Liveness of the ingest and arbitration loops

use std::sync::atomic::Ordering;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LoopHealth {
    pub ingest: bool,
    pub engine: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when both loops are running, otherwise "degraded"
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub loops: LoopHealth,
}

/// GET /health
///
/// 503 once either loop has stopped, so a supervisor can restart the service.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let loops = LoopHealth {
        ingest: state.ingest_stats.running.load(Ordering::Relaxed),
        engine: state.engine_stats.running.load(Ordering::Relaxed),
    };
    let healthy = loops.ingest && loops.engine;

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        module: "recon-arbiter",
        version: env!("CARGO_PKG_VERSION"),
        loops,
    };
    (code, Json(response))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
