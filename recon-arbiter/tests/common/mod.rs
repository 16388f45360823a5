//! In-memory stand-ins for the entity and task services
//!
//! Every call is recorded so tests can assert on exactly what the arbiter
//! asked the remote services to do.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use recon_arbiter::cache::EntityCache;
use recon_arbiter::engine::{ArbitrationEngine, EngineConfig};
use recon_arbiter::ledger::TaskLedger;
use recon_arbiter::services::{EntityService, TaskService};
use recon_common::lattice::EntityEventResponse;
use recon_common::{
    Classification, Disposition, Entity, Error, Position, Provenance, Result, TaskId, TaskStatus,
};

#[derive(Default)]
pub struct FakeEntities {
    pub overrides: Mutex<Vec<(String, Disposition)>>,
    pub fail_overrides: AtomicBool,
    /// Scripted poll results, consumed front to back; empty response once drained
    pub responses: Mutex<VecDeque<Result<EntityEventResponse>>>,
    pub poll_tokens: Mutex<Vec<String>>,
    /// Sighting stored into a cache while the next override is in flight
    pub racing_sighting: Mutex<Option<(Arc<EntityCache>, Entity)>>,
}

impl FakeEntities {
    pub fn override_calls(&self) -> Vec<(String, Disposition)> {
        self.overrides.lock().unwrap().clone()
    }

    pub fn script(&self, response: Result<EntityEventResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn tokens(&self) -> Vec<String> {
        self.poll_tokens.lock().unwrap().clone()
    }

    /// Have the next override call store `entity` into `cache` before returning
    pub fn sight_during_override(&self, cache: &Arc<EntityCache>, entity: Entity) {
        *self.racing_sighting.lock().unwrap() = Some((Arc::clone(cache), entity));
    }
}

#[async_trait]
impl EntityService for FakeEntities {
    async fn poll_events(&self, session_token: &str) -> Result<EntityEventResponse> {
        self.poll_tokens.lock().unwrap().push(session_token.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(EntityEventResponse::default()))
    }

    async fn override_disposition(&self, entity: &Entity, disposition: Disposition) -> Result<()> {
        self.overrides
            .lock()
            .unwrap()
            .push((entity.id.clone(), disposition));
        let racing = self.racing_sighting.lock().unwrap().take();
        if let Some((cache, sighting)) = racing {
            cache.put(sighting.id.clone(), sighting).await;
        }
        if self.fail_overrides.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                body: "override rejected".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTasks {
    /// (asset id, track id) per creation call
    pub created: Mutex<Vec<(String, String)>>,
    pub status_queries: Mutex<Vec<TaskId>>,
    pub statuses: Mutex<HashMap<TaskId, TaskStatus>>,
    pub fail_create: AtomicBool,
    pub fail_status: AtomicBool,
    next_id: AtomicU64,
}

impl FakeTasks {
    pub fn creation_calls(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn status_query_count(&self) -> usize {
        self.status_queries.lock().unwrap().len()
    }

    pub fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        self.statuses.lock().unwrap().insert(task_id.clone(), status);
    }
}

#[async_trait]
impl TaskService for FakeTasks {
    async fn create_investigation(&self, asset: &Entity, track: &Entity) -> Result<TaskId> {
        self.created
            .lock()
            .unwrap()
            .push((asset.id.clone(), track.id.clone()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task_id = TaskId::new(format!("task-{}", n));
        // New tasks start out executing
        self.set_status(&task_id, TaskStatus::Executing);
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.status_queries.lock().unwrap().push(task_id.clone());
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let status = self.statuses.lock().unwrap().get(task_id).copied();
        status.ok_or_else(|| Error::Api {
            status: 404,
            body: format!("no task {}", task_id),
        })
    }
}

pub fn entity(
    id: &str,
    classification: Classification,
    disposition: Disposition,
    lat: f64,
    lon: f64,
) -> Entity {
    Entity {
        id: id.to_string(),
        name: None,
        classification,
        disposition,
        position: Position::new(lat, lon),
        speed_mps: 1.0,
        provenance: Provenance::default(),
    }
}

pub fn asset(id: &str, lat: f64, lon: f64) -> Entity {
    entity(id, Classification::Asset, Disposition::Friendly, lat, lon)
}

pub fn track(id: &str, disposition: Disposition, lat: f64, lon: f64) -> Entity {
    entity(id, Classification::Track, disposition, lat, lon)
}

/// Engine wired to fakes, with handles to everything it touches
pub struct Harness {
    pub assets: Arc<EntityCache>,
    pub tracks: Arc<EntityCache>,
    pub ledger: Arc<TaskLedger>,
    pub entities: Arc<FakeEntities>,
    pub tasks: Arc<FakeTasks>,
    pub engine: ArbitrationEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let assets = Arc::new(EntityCache::new(150));
        let tracks = Arc::new(EntityCache::new(150));
        let ledger = Arc::new(TaskLedger::new(150));
        let entities = Arc::new(FakeEntities::default());
        let tasks = Arc::new(FakeTasks::default());

        let engine = ArbitrationEngine::new(
            Arc::clone(&assets),
            Arc::clone(&tracks),
            Arc::clone(&ledger),
            entities.clone(),
            tasks.clone(),
            config,
        );

        Self {
            assets,
            tracks,
            ledger,
            entities,
            tasks,
            engine,
        }
    }

    pub async fn add(&self, entity: Entity) {
        let cache = match entity.classification {
            Classification::Asset => &self.assets,
            _ => &self.tracks,
        };
        cache.put(entity.id.clone(), entity).await;
    }
}
