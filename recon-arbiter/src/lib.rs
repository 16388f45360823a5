//! recon-arbiter library
//!
//! Pairs friendly assets with nearby non-friendly tracks and dispatches
//! investigate tasks, at most one outstanding task per entity. The ingest
//! loop ([`ingest::EntityIngestor`]) and the decision loop
//! ([`engine::ArbitrationEngine`]) run as separate tasks and share only the
//! entity caches and the task ledger.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};

pub mod api;
pub mod cache;
pub mod engine;
pub mod ingest;
pub mod ledger;
pub mod matcher;
pub mod services;

use cache::EntityCache;
use engine::EngineStats;
use ingest::IngestStats;
use ledger::TaskLedger;

/// State shared with the status API handlers
#[derive(Clone)]
pub struct AppState {
    pub assets: Arc<EntityCache>,
    pub tracks: Arc<EntityCache>,
    pub ledger: Arc<TaskLedger>,
    pub engine_stats: Arc<EngineStats>,
    pub ingest_stats: Arc<IngestStats>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        assets: Arc<EntityCache>,
        tracks: Arc<EntityCache>,
        ledger: Arc<TaskLedger>,
        engine_stats: Arc<EngineStats>,
        ingest_stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            assets,
            tracks,
            ledger,
            engine_stats,
            ingest_stats,
            startup_time: Utc::now(),
        }
    }
}

/// Build the status router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/status", get(api::get_status))
        .merge(api::health_routes())
        .with_state(state)
}
