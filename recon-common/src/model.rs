//! Domain model shared by the arbiter and the simulator
//!
//! [`Entity`] is the validated, typed view of a [`WireEntity`]. Conversion
//! from the wire record goes through `TryFrom`, which rejects payloads the
//! arbiter cannot reason about (no id, no template, no usable position).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lattice::{
    Aliases, Location, MilView, Ontology, WireEntity, WirePosition, WireProvenance,
};
use crate::Error;

/// Ontology template of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Taskable friendly platform
    Asset,
    /// Observed contact
    Track,
    /// Any other template (points of interest, geo shapes, signals)
    Other,
}

impl Classification {
    pub fn from_wire(template: &str) -> Self {
        match template {
            "TEMPLATE_ASSET" => Classification::Asset,
            "TEMPLATE_TRACK" => Classification::Track,
            _ => Classification::Other,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Classification::Asset => "TEMPLATE_ASSET",
            Classification::Track => "TEMPLATE_TRACK",
            Classification::Other => "TEMPLATE_INVALID",
        }
    }
}

/// Affiliation of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Unknown,
    Friendly,
    AssumedFriendly,
    Suspicious,
    Hostile,
}

impl Disposition {
    /// Parse a `DISPOSITION_*` string. Values outside the five tracked
    /// dispositions (neutral, pending, invalid) are treated as unknown.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "DISPOSITION_FRIENDLY" => Disposition::Friendly,
            "DISPOSITION_ASSUMED_FRIENDLY" => Disposition::AssumedFriendly,
            "DISPOSITION_SUSPICIOUS" => Disposition::Suspicious,
            "DISPOSITION_HOSTILE" => Disposition::Hostile,
            _ => Disposition::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Disposition::Unknown => "DISPOSITION_UNKNOWN",
            Disposition::Friendly => "DISPOSITION_FRIENDLY",
            Disposition::AssumedFriendly => "DISPOSITION_ASSUMED_FRIENDLY",
            Disposition::Suspicious => "DISPOSITION_SUSPICIOUS",
            Disposition::Hostile => "DISPOSITION_HOSTILE",
        }
    }

    /// Friendly or assumed friendly
    pub fn is_friendly(&self) -> bool {
        matches!(self, Disposition::Friendly | Disposition::AssumedFriendly)
    }

    /// Already flagged for investigation (suspicious or hostile)
    pub fn is_escalated(&self) -> bool {
        matches!(self, Disposition::Suspicious | Disposition::Hostile)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Geographic position in degrees; altitude is carried but never matched on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
    pub altitude_hae_meters: Option<f64>,
}

impl Position {
    pub fn new(latitude_degrees: f64, longitude_degrees: f64) -> Self {
        Self {
            latitude_degrees,
            longitude_degrees,
            altitude_hae_meters: None,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude_degrees.is_finite()
            && self.longitude_degrees.is_finite()
            && (-90.0..=90.0).contains(&self.latitude_degrees)
            && (-180.0..=180.0).contains(&self.longitude_degrees)
    }
}

/// Where an entity record came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub integration_name: Option<String>,
    pub data_type: Option<String>,
    pub source_id: Option<String>,
    pub source_description: Option<String>,
    pub source_update_time: Option<DateTime<Utc>>,
}

impl Provenance {
    /// Copy of this provenance stamped with a new update time
    pub fn restamped(&self, at: DateTime<Utc>) -> Self {
        Self {
            source_update_time: Some(at),
            ..self.clone()
        }
    }

    pub fn to_wire(&self) -> WireProvenance {
        WireProvenance {
            integration_name: self.integration_name.clone(),
            data_type: self.data_type.clone(),
            source_id: self.source_id.clone(),
            source_update_time: self.source_update_time,
            source_description: self.source_description.clone(),
        }
    }
}

impl From<WireProvenance> for Provenance {
    fn from(wire: WireProvenance) -> Self {
        Self {
            integration_name: wire.integration_name,
            data_type: wire.data_type,
            source_id: wire.source_id,
            source_description: wire.source_description,
            source_update_time: wire.source_update_time,
        }
    }
}

/// Snapshot of an entity as last seen on the stream
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: Option<String>,
    pub classification: Classification,
    pub disposition: Disposition,
    pub position: Position,
    /// Meters per second; only used as a task parameter
    pub speed_mps: f64,
    pub provenance: Provenance,
}

impl Entity {
    /// Map back onto the wire record
    pub fn to_wire(&self) -> WireEntity {
        WireEntity {
            entity_id: self.id.clone(),
            aliases: self.name.as_ref().map(|name| Aliases {
                name: Some(name.clone()),
            }),
            location: Some(Location {
                position: Some(WirePosition {
                    latitude_degrees: Some(self.position.latitude_degrees),
                    longitude_degrees: Some(self.position.longitude_degrees),
                    altitude_hae_meters: self.position.altitude_hae_meters,
                }),
                speed_mps: Some(self.speed_mps),
                velocity_enu: None,
            }),
            mil_view: Some(MilView {
                disposition: Some(self.disposition.as_wire().to_string()),
                environment: None,
            }),
            ontology: Some(Ontology {
                template: Some(self.classification.as_wire().to_string()),
                platform_type: None,
            }),
            provenance: Some(self.provenance.to_wire()),
            ..Default::default()
        }
    }
}

impl TryFrom<WireEntity> for Entity {
    type Error = Error;

    fn try_from(wire: WireEntity) -> Result<Self, Self::Error> {
        if wire.entity_id.trim().is_empty() {
            return Err(Error::InvalidEntity("missing entityId".to_string()));
        }
        let id = wire.entity_id;

        let template = wire
            .ontology
            .and_then(|o| o.template)
            .ok_or_else(|| Error::InvalidEntity(format!("{}: missing ontology.template", id)))?;

        let location = wire.location.unwrap_or_default();
        let wire_position = location
            .position
            .ok_or_else(|| Error::InvalidEntity(format!("{}: missing location.position", id)))?;
        let position = match (wire_position.latitude_degrees, wire_position.longitude_degrees) {
            (Some(lat), Some(lon)) => Position {
                latitude_degrees: lat,
                longitude_degrees: lon,
                altitude_hae_meters: wire_position.altitude_hae_meters,
            },
            _ => {
                return Err(Error::InvalidEntity(format!(
                    "{}: position lacks latitude or longitude",
                    id
                )))
            }
        };
        if !position.is_valid() {
            return Err(Error::InvalidEntity(format!(
                "{}: position out of range ({}, {})",
                id, position.latitude_degrees, position.longitude_degrees
            )));
        }

        let disposition = wire
            .mil_view
            .and_then(|m| m.disposition)
            .map(|d| Disposition::from_wire(&d))
            .unwrap_or(Disposition::Unknown);

        let speed_mps = location
            .speed_mps
            .filter(|s| s.is_finite())
            .unwrap_or(0.0);

        Ok(Entity {
            id,
            name: wire.aliases.and_then(|a| a.name),
            classification: Classification::from_wire(&template),
            disposition,
            position,
            speed_mps,
            provenance: wire.provenance.map(Provenance::from).unwrap_or_default(),
        })
    }
}

/// Identifier of a task issued by the task service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Invalid,
    Created,
    ScheduledInManager,
    Sent,
    MachineReceipt,
    Ack,
    Wilco,
    Executing,
    WaitingForUpdate,
    DoneOk,
    DoneNotOk,
    Replaced,
    CancelRequested,
    /// A status string this build does not know; treated as in progress
    Unrecognized,
}

impl TaskStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "STATUS_CREATED" => TaskStatus::Created,
            "STATUS_SCHEDULED_IN_MANAGER" => TaskStatus::ScheduledInManager,
            "STATUS_SENT" => TaskStatus::Sent,
            "STATUS_MACHINE_RECEIPT" => TaskStatus::MachineReceipt,
            "STATUS_ACK" => TaskStatus::Ack,
            "STATUS_WILCO" => TaskStatus::Wilco,
            "STATUS_EXECUTING" => TaskStatus::Executing,
            "STATUS_WAITING_FOR_UPDATE" => TaskStatus::WaitingForUpdate,
            "STATUS_DONE_OK" => TaskStatus::DoneOk,
            "STATUS_DONE_NOT_OK" => TaskStatus::DoneNotOk,
            "STATUS_REPLACED" => TaskStatus::Replaced,
            "STATUS_CANCEL_REQUESTED" => TaskStatus::CancelRequested,
            "STATUS_INVALID" => TaskStatus::Invalid,
            _ => TaskStatus::Unrecognized,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            TaskStatus::Invalid => "STATUS_INVALID",
            TaskStatus::Created => "STATUS_CREATED",
            TaskStatus::ScheduledInManager => "STATUS_SCHEDULED_IN_MANAGER",
            TaskStatus::Sent => "STATUS_SENT",
            TaskStatus::MachineReceipt => "STATUS_MACHINE_RECEIPT",
            TaskStatus::Ack => "STATUS_ACK",
            TaskStatus::Wilco => "STATUS_WILCO",
            TaskStatus::Executing => "STATUS_EXECUTING",
            TaskStatus::WaitingForUpdate => "STATUS_WAITING_FOR_UPDATE",
            TaskStatus::DoneOk => "STATUS_DONE_OK",
            TaskStatus::DoneNotOk => "STATUS_DONE_NOT_OK",
            TaskStatus::Replaced => "STATUS_REPLACED",
            TaskStatus::CancelRequested => "STATUS_CANCEL_REQUESTED",
            TaskStatus::Unrecognized => "STATUS_UNRECOGNIZED",
        }
    }

    /// Still outstanding: anything short of a known terminal state
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            TaskStatus::DoneOk | TaskStatus::DoneNotOk | TaskStatus::Replaced | TaskStatus::Invalid
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
