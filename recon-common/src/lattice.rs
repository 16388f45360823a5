//! Lattice REST wire types
//!
//! Mirrors the JSON bodies of the entity and task endpoints under `/api/v1`.
//! Every field the services may omit is optional here; validation happens
//! when a wire entity is mapped onto [`crate::model::Entity`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::Entity;

/// Field path for the disposition override
pub const DISPOSITION_FIELD_PATH: &str = "mil_view.disposition";

/// Protobuf `Any` type URL of the investigate task
pub const INVESTIGATE_TASK_TYPE: &str = "type.googleapis.com/anduril.tasks.v2.Investigate";

/// Entity record as published on the entity stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Aliases>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mil_view: Option<MilView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology: Option<Ontology>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<WireProvenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_catalog: Option<TaskCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aliases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WirePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_enu: Option<Enu>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_hae_meters: Option<f64>,
}

/// East/north/up velocity, m/s
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enu {
    pub e: f64,
    pub n: f64,
    pub u: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ontology {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCatalog {
    #[serde(default)]
    pub task_definitions: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub task_specification_url: String,
}

// ============================================================================
// Entity events
// ============================================================================

/// Body of `POST /entities/events`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEventRequest {
    pub session_token: String,
}

/// Response of `POST /entities/events`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEventResponse {
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub entity_events: Vec<EntityEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<WireEntity>,
}

/// Body of `PUT /entities/{id}/override/{field_path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOverride {
    pub entity: WireEntity,
    pub provenance: WireProvenance,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<System>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Principal {
    /// Principal identifying a software service
    pub fn service(service_name: impl Into<String>) -> Self {
        Self {
            system: Some(System {
                service_name: Some(service_name.into()),
                entity_id: None,
            }),
            user: None,
        }
    }

    /// Principal identifying an entity (an asset acting as task agent)
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self {
            system: Some(System {
                service_name: None,
                entity_id: Some(entity_id.into()),
            }),
            user: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Principal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEntity {
    pub entity: WireEntity,
    pub snapshot: bool,
}

/// Body of `POST /tasks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreation {
    pub display_name: String,
    pub description: String,
    pub specification: Value,
    pub author: Principal,
    pub relations: Relations,
    pub is_executed_elsewhere: bool,
    #[serde(default)]
    pub initial_entities: Vec<TaskEntity>,
}

impl TaskCreation {
    /// Investigate task assigning `asset` to observe `track`
    pub fn investigate(asset: &Entity, track: &Entity, service_name: &str) -> Self {
        Self {
            display_name: format!("Asset {} -> Track {}", asset.id, track.id),
            description: format!(
                "Asset {} tasked to perform ISR on Track {}",
                asset.id, track.id
            ),
            specification: json!({
                "@type": INVESTIGATE_TASK_TYPE,
                "objective": { "entityId": track.id },
                "parameters": { "speedMS": asset.speed_mps },
            }),
            author: Principal::service(service_name),
            relations: Relations {
                assignee: Some(Principal::entity(asset.id.clone())),
            },
            is_executed_elsewhere: false,
            initial_entities: vec![TaskEntity {
                entity: asset.to_wire(),
                snapshot: false,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskVersion {
    #[serde(default)]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_version: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTaskStatus {
    #[serde(default)]
    pub status: String,
}

/// Task record returned by create/get
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<TaskVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WireTaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<Value>,
}

impl WireTask {
    pub fn task_id(&self) -> Option<&str> {
        self.version
            .as_ref()
            .map(|v| v.task_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Body of `PUT /tasks/{id}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdate {
    pub new_status: WireTaskStatus,
    pub author: Principal,
    pub status_version: u64,
}

/// Body of `POST /agent/listen`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentListener {
    pub agent_selector: EntityIdsSelector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityIdsSelector {
    pub entity_ids: Vec<String>,
}

/// Response of `POST /agent/listen`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_request: Option<ExecuteRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_request: Option<CancelRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub task: WireTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub task_id: String,
}
