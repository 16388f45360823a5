//! Runtime status: cache occupancy, ledger size and loop counters

use axum::{extract::State, Json};
use serde::Serialize;

use crate::engine::EngineStatsSnapshot;
use crate::ingest::IngestStatsSnapshot;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct LedgerStatus {
    pub assets: usize,
    pub tracks: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_secs: i64,
    pub assets: CacheStatus,
    pub tracks: CacheStatus,
    pub ledger: LedgerStatus,
    pub engine: EngineStatsSnapshot,
    pub ingest: IngestStatsSnapshot,
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let uptime = chrono::Utc::now() - state.startup_time;

    Json(StatusResponse {
        module: "recon-arbiter".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_secs: uptime.num_seconds(),
        assets: CacheStatus {
            entries: state.assets.len().await,
            capacity: state.assets.capacity(),
        },
        tracks: CacheStatus {
            entries: state.tracks.len().await,
            capacity: state.tracks.capacity(),
        },
        ledger: LedgerStatus {
            assets: state.ledger.asset_entries().await,
            tracks: state.ledger.track_entries().await,
        },
        engine: state.engine_stats.snapshot(),
        ingest: state.ingest_stats.snapshot(),
    })
}
