//! Arbitration engine
//!
//! Every cycle takes a snapshot of both entity caches and walks each
//! asset x track pair in order:
//!
//! 1. Skip pairs out of range and tracks that are (assumed) friendly.
//! 2. Escalate a track that is neither suspicious nor hostile by overriding
//!    its disposition to suspicious.
//! 3. Consult the ledger for both entities; an active task on either side
//!    skips the pair, an inactive one is cleared.
//! 4. With no ledger entry left on either side, create an investigate task
//!    and record it under both ids.
//!
//! Collaborator failures are logged and only affect the pair at hand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recon_common::config::TomlConfig;
use recon_common::{Disposition, Entity, TaskId};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::ledger::TaskLedger;
use crate::matcher::ProximityMatcher;
use crate::services::{EntityService, TaskService};

/// What happened to one asset/track pair in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    OutOfRange,
    FriendlyTrack,
    /// A task for the asset or the track is still active
    InProgress,
    /// A ledger status check failed; retried next cycle
    StatusUnavailable,
    Tasked(TaskId),
    CreationFailed,
}

/// Result of checking the ledger for a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Neither side has an outstanding task
    Idle,
    Active,
    /// A status lookup failed; the entry is kept
    Unknown,
}

/// Tally of one arbitration cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub assets: usize,
    pub tracks: usize,
    pub pairs_in_range: usize,
    pub overrides: usize,
    pub override_failures: usize,
    pub tasks_created: usize,
    pub creation_failures: usize,
    pub in_progress: usize,
    pub status_failures: usize,
}

/// Counters accumulated across cycles by one engine
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Set while `run` is looping
    pub running: AtomicBool,
    pub cycles: AtomicU64,
    pub overrides: AtomicU64,
    pub override_failures: AtomicU64,
    pub tasks_created: AtomicU64,
    pub creation_failures: AtomicU64,
    pub status_failures: AtomicU64,
    pub stale_entries_cleared: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub running: bool,
    pub cycles: u64,
    pub overrides: u64,
    pub override_failures: u64,
    pub tasks_created: u64,
    pub creation_failures: u64,
    pub status_failures: u64,
    pub stale_entries_cleared: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            running: self.running.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            overrides: self.overrides.load(Ordering::Relaxed),
            override_failures: self.override_failures.load(Ordering::Relaxed),
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            status_failures: self.status_failures.load(Ordering::Relaxed),
            stale_entries_cleared: self.stale_entries_cleared.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &CycleReport) {
        let add = |counter: &AtomicU64, n: usize| {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        };
        add(&self.cycles, 1);
        add(&self.overrides, report.overrides);
        add(&self.override_failures, report.override_failures);
        add(&self.tasks_created, report.tasks_created);
        add(&self.creation_failures, report.creation_failures);
        add(&self.status_failures, report.status_failures);
    }
}

/// Engine timing and range settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cycle_period: Duration,
    pub proximity_threshold_meters: f64,
}

impl EngineConfig {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            cycle_period: Duration::from_secs(config.arbiter.cycle_period_secs),
            proximity_threshold_meters: config.arbiter.proximity_threshold_meters,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

pub struct ArbitrationEngine {
    assets: Arc<EntityCache>,
    tracks: Arc<EntityCache>,
    ledger: Arc<TaskLedger>,
    entities: Arc<dyn EntityService>,
    tasks: Arc<dyn TaskService>,
    matcher: ProximityMatcher,
    cycle_period: Duration,
    stats: Arc<EngineStats>,
}

impl ArbitrationEngine {
    pub fn new(
        assets: Arc<EntityCache>,
        tracks: Arc<EntityCache>,
        ledger: Arc<TaskLedger>,
        entities: Arc<dyn EntityService>,
        tasks: Arc<dyn TaskService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            assets,
            tracks,
            ledger,
            entities,
            tasks,
            matcher: ProximityMatcher::new(config.proximity_threshold_meters),
            cycle_period: config.cycle_period,
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Run cycles on a fixed period until `cancel` fires.
    ///
    /// Cancellation is only observed between cycles, so a cycle that has
    /// started always finishes its ledger updates.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting ArbitrationEngine (period: {:?}, threshold: {} m)",
            self.cycle_period,
            self.matcher.threshold_meters()
        );

        self.stats.running.store(true, Ordering::Relaxed);
        let mut timer = interval(self.cycle_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let report = self.run_cycle().await;
            if report.overrides + report.tasks_created > 0 {
                info!(
                    overrides = report.overrides,
                    tasks_created = report.tasks_created,
                    "Arbitration cycle dispatched work"
                );
            }
        }

        self.stats.running.store(false, Ordering::Relaxed);
        info!("ArbitrationEngine stopped");
    }

    /// Evaluate every asset x track pair once
    pub async fn run_cycle(&self) -> CycleReport {
        let assets = self.assets.get_all().await;
        let mut tracks = self.tracks.get_all().await;

        let mut report = CycleReport {
            assets: assets.len(),
            tracks: tracks.len(),
            ..Default::default()
        };
        debug!(assets = report.assets, tracks = report.tracks, "Arbitration cycle");

        for asset in &assets {
            for track in tracks.iter_mut() {
                let outcome = self.evaluate_pair(asset, track, &mut report).await;
                match outcome {
                    PairOutcome::OutOfRange | PairOutcome::FriendlyTrack => {}
                    PairOutcome::InProgress => report.in_progress += 1,
                    PairOutcome::StatusUnavailable => report.status_failures += 1,
                    PairOutcome::Tasked(_) => report.tasks_created += 1,
                    PairOutcome::CreationFailed => report.creation_failures += 1,
                }
            }
        }

        self.stats.record(&report);
        report
    }

    /// Walk one pair through override, ledger check and tasking.
    ///
    /// `track` is this cycle's snapshot; a successful override refreshes its
    /// disposition from the cache so later pairs in the same cycle see it.
    pub async fn evaluate_pair(
        &self,
        asset: &Entity,
        track: &mut Entity,
        report: &mut CycleReport,
    ) -> PairOutcome {
        if !self.matcher.within_range(asset, track) {
            return PairOutcome::OutOfRange;
        }
        if track.disposition.is_friendly() {
            return PairOutcome::FriendlyTrack;
        }
        report.pairs_in_range += 1;

        if !track.disposition.is_escalated() {
            self.escalate(track, report).await;
            if track.disposition.is_friendly() {
                return PairOutcome::FriendlyTrack;
            }
        }

        match self.check_in_progress(asset, track).await {
            Progress::Active => return PairOutcome::InProgress,
            Progress::Unknown => return PairOutcome::StatusUnavailable,
            Progress::Idle => {}
        }

        match self.tasks.create_investigation(asset, track).await {
            Ok(task_id) => {
                self.ledger.record(&asset.id, &track.id, task_id.clone()).await;
                info!(
                    asset_id = %asset.id,
                    track_id = %track.id,
                    task_id = %task_id,
                    "Dispatched asset to investigate track"
                );
                PairOutcome::Tasked(task_id)
            }
            Err(e) => {
                warn!(
                    asset_id = %asset.id,
                    track_id = %track.id,
                    "Investigate task creation failed: {}", e
                );
                PairOutcome::CreationFailed
            }
        }
    }

    /// Override the track to suspicious; failures leave the pair eligible
    async fn escalate(&self, track: &mut Entity, report: &mut CycleReport) {
        match self
            .entities
            .override_disposition(track, Disposition::Suspicious)
            .await
        {
            Ok(()) => {
                info!(
                    track_id = %track.id,
                    from = %track.disposition,
                    "Overrode track disposition to {}", Disposition::Suspicious
                );
                report.overrides += 1;

                // Edit only the disposition of whatever sighting is cached now;
                // a newer sighting that is friendly or escalated wins.
                let current = self
                    .tracks
                    .update_if_present(track.id.as_str(), |cached| {
                        if !cached.disposition.is_friendly() && !cached.disposition.is_escalated() {
                            cached.disposition = Disposition::Suspicious;
                        }
                        cached.disposition
                    })
                    .await;
                track.disposition = current.unwrap_or(Disposition::Suspicious);
                if track.disposition.is_friendly() {
                    info!(track_id = %track.id, "Track re-sighted as {} during override", track.disposition);
                }
            }
            Err(e) => {
                warn!(track_id = %track.id, "Disposition override failed: {}", e);
                report.override_failures += 1;
            }
        }
    }

    /// Check both sides of a pair against the ledger.
    ///
    /// An entry whose task is no longer active is removed. A failed lookup
    /// keeps the entry and reports [`Progress::Unknown`].
    pub async fn check_in_progress(&self, asset: &Entity, track: &Entity) -> Progress {
        let mut progress = Progress::Idle;

        if let Some(task_id) = self.ledger.asset_task(&asset.id).await {
            match self.side_active("asset", &asset.id, &task_id).await {
                Some(true) => progress = Progress::Active,
                Some(false) => {
                    self.ledger.clear_asset(&asset.id).await;
                }
                None => return Progress::Unknown,
            }
        }

        if let Some(task_id) = self.ledger.track_task(&track.id).await {
            match self.side_active("track", &track.id, &task_id).await {
                Some(true) => progress = Progress::Active,
                Some(false) => {
                    self.ledger.clear_track(&track.id).await;
                }
                None => return Progress::Unknown,
            }
        }

        progress
    }

    /// `None` when the status lookup failed
    async fn side_active(&self, side: &str, entity_id: &str, task_id: &TaskId) -> Option<bool> {
        match self.tasks.task_status(task_id).await {
            Ok(status) if status.is_active() => {
                debug!(side, entity_id, task_id = %task_id, status = %status, "Task still active");
                Some(true)
            }
            Ok(status) => {
                debug!(side, entity_id, task_id = %task_id, status = %status, "Task finished, clearing ledger entry");
                self.stats.stale_entries_cleared.fetch_add(1, Ordering::Relaxed);
                Some(false)
            }
            Err(e) => {
                warn!(side, entity_id, task_id = %task_id, "Task status lookup failed: {}", e);
                None
            }
        }
    }
}
