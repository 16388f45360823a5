//! Entity ingestion loop
//!
//! Long-polls the entity event stream and routes each update into the asset
//! or track cache. Malformed payloads are logged and dropped. Poll failures
//! never end the loop: the session token is reset and the loop backs off
//! for `error_backoff` before polling again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recon_common::config::{TomlConfig, TrackFilter};
use recon_common::lattice::{EntityEvent, WireEntity};
use recon_common::{Classification, Disposition, Entity, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::EntityCache;
use crate::services::EntityService;

const EVENT_TYPE_DELETED: &str = "EVENT_TYPE_DELETED";

/// Where an entity update goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Asset,
    Track,
    /// A track the filter does not admit (e.g. friendly)
    RejectedTrack,
    /// Neither asset nor track
    Ignored,
}

/// Classify an entity against the track admission policy
pub fn route(entity: &Entity, filter: TrackFilter) -> Route {
    match entity.classification {
        Classification::Asset => Route::Asset,
        Classification::Track if admits(filter, entity.disposition) => Route::Track,
        Classification::Track => Route::RejectedTrack,
        Classification::Other => Route::Ignored,
    }
}

fn admits(filter: TrackFilter, disposition: Disposition) -> bool {
    match filter {
        TrackFilter::NonFriendly => disposition != Disposition::Friendly,
        TrackFilter::SuspiciousOrHostile => disposition.is_escalated(),
    }
}

/// Ingest loop timing and admission policy
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub track_filter: TrackFilter,
}

impl IngestConfig {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.ingest.poll_interval_ms),
            error_backoff: Duration::from_secs(config.ingest.error_backoff_secs),
            track_filter: config.arbiter.track_filter,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Counters owned by one ingestor
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Set while `run` is looping
    pub running: AtomicBool,
    pub polls: AtomicU64,
    pub poll_failures: AtomicU64,
    pub events: AtomicU64,
    pub assets_routed: AtomicU64,
    pub tracks_routed: AtomicU64,
    pub dropped: AtomicU64,
    pub malformed: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStatsSnapshot {
    pub running: bool,
    pub polls: u64,
    pub poll_failures: u64,
    pub events: u64,
    pub assets_routed: u64,
    pub tracks_routed: u64,
    pub dropped: u64,
    pub malformed: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            running: self.running.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            assets_routed: self.assets_routed.load(Ordering::Relaxed),
            tracks_routed: self.tracks_routed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub struct EntityIngestor {
    service: Arc<dyn EntityService>,
    assets: Arc<EntityCache>,
    tracks: Arc<EntityCache>,
    config: IngestConfig,
    stats: Arc<IngestStats>,
}

impl EntityIngestor {
    pub fn new(
        service: Arc<dyn EntityService>,
        assets: Arc<EntityCache>,
        tracks: Arc<EntityCache>,
        config: IngestConfig,
    ) -> Self {
        Self {
            service,
            assets,
            tracks,
            config,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Poll until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting EntityIngestor (poll interval: {:?}, error backoff: {:?}, track filter: {:?})",
            self.config.poll_interval, self.config.error_backoff, self.config.track_filter
        );

        self.stats.running.store(true, Ordering::Relaxed);
        let mut session_token = String::new();
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once(&session_token) => result,
            };

            let pause = match result {
                Ok(next_token) => {
                    session_token = next_token;
                    self.config.poll_interval
                }
                Err(e) => {
                    bump(&self.stats.poll_failures);
                    if e.is_transient() {
                        warn!("Entity stream poll failed, retrying in {:?}: {}", self.config.error_backoff, e);
                    } else {
                        error!("Entity stream poll failed, retrying in {:?}: {}", self.config.error_backoff, e);
                    }
                    session_token.clear();
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.stats.running.store(false, Ordering::Relaxed);
        info!("EntityIngestor stopped");
    }

    /// One long poll; returns the session token for the next poll
    pub async fn poll_once(&self, session_token: &str) -> Result<String> {
        bump(&self.stats.polls);
        let response = self.service.poll_events(session_token).await?;

        for event in response.entity_events {
            self.handle_event(event).await;
        }

        Ok(response.session_token)
    }

    async fn handle_event(&self, event: EntityEvent) {
        bump(&self.stats.events);
        let Some(wire) = event.entity else {
            debug!("Entity event without entity, ignoring");
            bump(&self.stats.dropped);
            return;
        };

        if event.event_type.as_deref() == Some(EVENT_TYPE_DELETED) {
            debug!(entity_id = %wire.entity_id, "Entity deleted upstream");
            self.assets.remove(wire.entity_id.as_str()).await;
            self.tracks.remove(wire.entity_id.as_str()).await;
            return;
        }

        self.ingest(wire).await;
    }

    /// Validate one entity record and route it into a cache
    pub async fn ingest(&self, wire: WireEntity) -> Option<Route> {
        let entity = match Entity::try_from(wire) {
            Ok(entity) => entity,
            Err(e) => {
                warn!("Dropping malformed entity: {}", e);
                bump(&self.stats.malformed);
                return None;
            }
        };

        let route = route(&entity, self.config.track_filter);
        match route {
            Route::Asset => {
                bump(&self.stats.assets_routed);
                let id = entity.id.clone();
                if let Some(evicted) = self.assets.put(id, entity).await {
                    debug!(asset_id = %evicted, "Asset evicted from cache");
                }
            }
            Route::Track => {
                bump(&self.stats.tracks_routed);
                let id = entity.id.clone();
                if let Some(evicted) = self.tracks.put(id, entity).await {
                    debug!(track_id = %evicted, "Track evicted from cache");
                }
            }
            Route::RejectedTrack => {
                bump(&self.stats.dropped);
                // A track that turned friendly must not linger as a candidate
                if self.tracks.remove(entity.id.as_str()).await.is_some() {
                    debug!(
                        track_id = %entity.id,
                        disposition = %entity.disposition,
                        "Track no longer admitted, removed from cache"
                    );
                }
            }
            Route::Ignored => {
                bump(&self.stats.dropped);
            }
        }

        Some(route)
    }
}
