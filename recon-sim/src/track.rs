//! Simulated unknown surface track

use chrono::{DateTime, Utc};
use recon_common::client::EntityClient;
use recon_common::lattice::{
    Aliases, Enu, Location, MilView, Ontology, WireEntity, WirePosition, WireProvenance,
};
use recon_common::{Classification, Disposition};
use tokio_util::sync::CancellationToken;

use crate::publisher::{publish_loop, SimSettings, INTEGRATION_NAME};

pub struct SimulatedTrack {
    settings: SimSettings,
    entities: EntityClient,
}

impl SimulatedTrack {
    pub fn new(settings: SimSettings, entities: EntityClient) -> Self {
        Self { settings, entities }
    }

    pub fn generate_entity(&self, now: DateTime<Utc>) -> WireEntity {
        let id = &self.settings.entity_id;
        let position = self.settings.position;

        WireEntity {
            entity_id: id.clone(),
            is_live: Some(true),
            expiry_time: Some(self.settings.expiry_from(now)),
            aliases: Some(Aliases {
                name: Some(format!("Simulated Track {}", id)),
            }),
            location: Some(Location {
                position: Some(WirePosition {
                    latitude_degrees: Some(position.latitude_degrees),
                    longitude_degrees: Some(position.longitude_degrees),
                    altitude_hae_meters: Some(0.0),
                }),
                speed_mps: Some(1.0),
                velocity_enu: Some(Enu { e: 1.0, n: 1.0, u: 0.0 }),
            }),
            mil_view: Some(MilView {
                disposition: Some(Disposition::Unknown.as_wire().to_string()),
                environment: Some("ENVIRONMENT_SURFACE".to_string()),
            }),
            ontology: Some(Ontology {
                template: Some(Classification::Track.as_wire().to_string()),
                platform_type: Some("UNKNOWN".to_string()),
            }),
            provenance: Some(WireProvenance {
                integration_name: Some(INTEGRATION_NAME.to_string()),
                data_type: Some("Simulated Track".to_string()),
                source_update_time: Some(now),
                ..Default::default()
            }),
            task_catalog: None,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        publish_loop(&self.entities, &self.settings, &cancel, |now| self.generate_entity(now)).await;
    }
}
