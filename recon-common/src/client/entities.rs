//! Entity endpoints

use tracing::debug;

use super::LatticeHttp;
use crate::lattice::{EntityEventRequest, EntityEventResponse, EntityOverride, WireEntity};
use crate::Result;

/// Client for `/entities`
#[derive(Clone)]
pub struct EntityClient {
    http: LatticeHttp,
}

impl EntityClient {
    pub fn new(http: LatticeHttp) -> Self {
        Self { http }
    }

    /// Long poll for entity events after `session_token` (empty = from now)
    pub async fn long_poll_events(&self, session_token: &str) -> Result<EntityEventResponse> {
        let url = self.http.url(&["entities", "events"])?;
        let body = EntityEventRequest {
            session_token: session_token.to_string(),
        };

        let response: EntityEventResponse = self
            .http
            .execute_json_or_default(self.http.post(url).json(&body))
            .await?;

        debug!(
            events = response.entity_events.len(),
            "Entity event long poll returned"
        );
        Ok(response)
    }

    /// Override one field of a remote entity
    pub async fn put_override(
        &self,
        entity_id: &str,
        field_path: &str,
        entity_override: &EntityOverride,
    ) -> Result<()> {
        let url = self.http.url(&["entities", entity_id, "override", field_path])?;
        debug!(entity_id = %entity_id, field_path = %field_path, "Putting entity override");
        self.http
            .execute_empty(self.http.put(url).json(entity_override))
            .await
    }

    /// Publish (create or update) an entity
    pub async fn publish_entity(&self, entity: &WireEntity) -> Result<()> {
        let url = self.http.url(&["entities"])?;
        self.http.execute_empty(self.http.put(url).json(entity)).await
    }

    pub async fn get_entity(&self, entity_id: &str) -> Result<WireEntity> {
        let url = self.http.url(&["entities", entity_id])?;
        self.http.execute_json(self.http.get(url)).await
    }
}
