//! Remote collaborators of the arbiter
//!
//! The ingest loop and the engine talk to the entity and task services only
//! through these traits. The Lattice implementations below wrap the REST
//! clients from `recon_common::client`; tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::Utc;
use recon_common::client::{EntityClient, TaskClient};
use recon_common::lattice::{
    EntityEventResponse, EntityOverride, MilView, TaskCreation, WireEntity,
    DISPOSITION_FIELD_PATH,
};
use recon_common::{Disposition, Entity, Error, Result, TaskId, TaskStatus};
use tracing::{debug, warn};

/// Entity stream and field overrides
#[async_trait]
pub trait EntityService: Send + Sync {
    /// One long poll of the entity event stream.
    ///
    /// `session_token` is the token returned by the previous poll, or empty
    /// to start from the current state.
    async fn poll_events(&self, session_token: &str) -> Result<EntityEventResponse>;

    /// Override the disposition of `entity` on the remote record
    async fn override_disposition(&self, entity: &Entity, disposition: Disposition) -> Result<()>;
}

/// Task creation and status
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Create an investigate task assigning `asset` to `track`
    async fn create_investigation(&self, asset: &Entity, track: &Entity) -> Result<TaskId>;

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;
}

/// Override body for a disposition change.
///
/// Carries the entity's own provenance stamped with the current time so the
/// override supersedes the last upstream update.
pub fn disposition_override(entity: &Entity, disposition: Disposition) -> EntityOverride {
    let provenance = entity.provenance.restamped(Utc::now()).to_wire();
    EntityOverride {
        entity: WireEntity {
            entity_id: entity.id.clone(),
            mil_view: Some(MilView {
                disposition: Some(disposition.as_wire().to_string()),
                environment: None,
            }),
            provenance: Some(provenance.clone()),
            ..Default::default()
        },
        provenance,
    }
}

#[async_trait]
impl EntityService for EntityClient {
    async fn poll_events(&self, session_token: &str) -> Result<EntityEventResponse> {
        self.long_poll_events(session_token).await
    }

    async fn override_disposition(&self, entity: &Entity, disposition: Disposition) -> Result<()> {
        let body = disposition_override(entity, disposition);
        self.put_override(&entity.id, DISPOSITION_FIELD_PATH, &body).await
    }
}

/// [`TaskService`] backed by the Lattice task API
pub struct LatticeTasker {
    client: TaskClient,
    /// Author service name on created tasks
    service_name: String,
}

impl LatticeTasker {
    pub fn new(client: TaskClient, service_name: impl Into<String>) -> Self {
        Self {
            client,
            service_name: service_name.into(),
        }
    }
}

#[async_trait]
impl TaskService for LatticeTasker {
    async fn create_investigation(&self, asset: &Entity, track: &Entity) -> Result<TaskId> {
        let creation = TaskCreation::investigate(asset, track, &self.service_name);
        let task = self.client.create_task(&creation).await?;
        let task_id = task
            .task_id()
            .ok_or_else(|| Error::Decode("task creation response has no taskId".to_string()))?;
        debug!(task_id = %task_id, "Task service accepted investigation");
        Ok(TaskId::new(task_id))
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let task = self.client.get_task(task_id.as_str()).await?;
        let raw = task
            .status
            .map(|status| status.status)
            .ok_or_else(|| Error::Decode(format!("task {} has no status", task_id)))?;
        let status = TaskStatus::from_wire(&raw);
        if status == TaskStatus::Unrecognized {
            warn!(task_id = %task_id, status = %raw, "Unrecognized task status, treating as active");
        }
        Ok(status)
    }
}
