//! Simulated friendly asset
//!
//! Publishes itself as a taskable surface vessel and acts as the task agent
//! for its own entity id: execute requests are acknowledged as executing,
//! cancel requests as done-not-ok.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use recon_common::client::{EntityClient, TaskClient};
use recon_common::lattice::{
    AgentListener, AgentRequest, Aliases, EntityIdsSelector, Enu, Location, MilView, Ontology,
    Principal, TaskCatalog, TaskDefinition, TaskStatusUpdate, WireEntity, WirePosition,
    WireProvenance, WireTaskStatus, INVESTIGATE_TASK_TYPE,
};
use recon_common::{Classification, Disposition, TaskStatus};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::publisher::{publish_loop, SimSettings, INTEGRATION_NAME};

const ALTITUDE_HAE_METERS: f64 = 55.0;
const SPEED_MPS: f64 = 1.0;

pub struct SimulatedAsset {
    settings: SimSettings,
    entities: EntityClient,
    tasks: TaskClient,
    /// Sent with every status update; bumped per agent request
    status_version: AtomicU64,
}

impl SimulatedAsset {
    pub fn new(settings: SimSettings, entities: EntityClient, tasks: TaskClient) -> Self {
        Self {
            settings,
            entities,
            tasks,
            status_version: AtomicU64::new(1),
        }
    }

    pub fn generate_entity(&self, now: DateTime<Utc>) -> WireEntity {
        let id = &self.settings.entity_id;
        let position = self.settings.position;

        WireEntity {
            entity_id: id.clone(),
            is_live: Some(true),
            expiry_time: Some(self.settings.expiry_from(now)),
            aliases: Some(Aliases {
                name: Some(format!("Simulated Asset {}", id)),
            }),
            location: Some(Location {
                position: Some(WirePosition {
                    latitude_degrees: Some(position.latitude_degrees),
                    longitude_degrees: Some(position.longitude_degrees),
                    altitude_hae_meters: Some(ALTITUDE_HAE_METERS),
                }),
                speed_mps: Some(SPEED_MPS),
                velocity_enu: Some(Enu { e: 1.0, n: 1.0, u: 0.0 }),
            }),
            mil_view: Some(MilView {
                disposition: Some(Disposition::Friendly.as_wire().to_string()),
                environment: Some("ENVIRONMENT_SURFACE".to_string()),
            }),
            ontology: Some(Ontology {
                template: Some(Classification::Asset.as_wire().to_string()),
                platform_type: Some("USV".to_string()),
            }),
            provenance: Some(WireProvenance {
                integration_name: Some(INTEGRATION_NAME.to_string()),
                data_type: Some("Simulated Asset".to_string()),
                source_update_time: Some(now),
                ..Default::default()
            }),
            task_catalog: Some(TaskCatalog {
                task_definitions: vec![TaskDefinition {
                    task_specification_url: INVESTIGATE_TASK_TYPE.to_string(),
                }],
            }),
        }
    }

    /// Status update answering an agent request, as `(task id, update)`.
    ///
    /// Returns `None` for an empty request or one without a task id.
    pub fn status_update(&self, request: &AgentRequest) -> Option<(String, TaskStatusUpdate)> {
        let (task_id, status) = if let Some(execute) = &request.execute_request {
            (execute.task.task_id()?.to_string(), TaskStatus::Executing)
        } else if let Some(cancel) = &request.cancel_request {
            (cancel.task_id.clone(), TaskStatus::DoneNotOk)
        } else {
            return None;
        };
        if task_id.is_empty() {
            return None;
        }

        let status_version = self.status_version.fetch_add(1, Ordering::SeqCst) + 1;
        let update = TaskStatusUpdate {
            new_status: WireTaskStatus {
                status: status.as_wire().to_string(),
            },
            author: Principal::entity(self.settings.entity_id.clone()),
            status_version,
        };
        Some((task_id, update))
    }

    /// Publish and listen for tasks until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        info!(entity_id = %self.settings.entity_id, "Starting simulated asset");
        tokio::join!(
            publish_loop(&self.entities, &self.settings, &cancel, |now| self.generate_entity(now)),
            self.listen_for_tasks(&cancel),
        );
        info!(entity_id = %self.settings.entity_id, "Simulated asset stopped");
    }

    async fn listen_for_tasks(&self, cancel: &CancellationToken) {
        let listener = AgentListener {
            agent_selector: EntityIdsSelector {
                entity_ids: vec![self.settings.entity_id.clone()],
            },
        };

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.tasks.listen_as_agent(&listener) => result,
            };

            match result {
                Ok(request) => self.handle_request(&request).await,
                Err(e) => {
                    error!(entity_id = %self.settings.entity_id, "Agent listen failed: {}", e);
                    // Back off instead of hammering a failing endpoint
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.refresh_interval) => {}
                    }
                }
            }
        }
    }

    async fn handle_request(&self, request: &AgentRequest) {
        if request.execute_request.is_none() && request.cancel_request.is_none() {
            return;
        }
        let Some((task_id, update)) = self.status_update(request) else {
            warn!("Agent request without task id: {:?}", request);
            return;
        };

        info!(
            task_id = %task_id,
            status = %update.new_status.status,
            status_version = update.status_version,
            "Acknowledging agent request"
        );
        if let Err(e) = self.tasks.update_task_status(&task_id, &update).await {
            error!(task_id = %task_id, "Task status update failed: {}", e);
        }
    }
}
