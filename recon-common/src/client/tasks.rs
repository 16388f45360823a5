//! Task endpoints

use tracing::debug;

use super::LatticeHttp;
use crate::lattice::{AgentListener, AgentRequest, TaskCreation, TaskStatusUpdate, WireTask};
use crate::Result;

/// Client for `/tasks` and `/agent`
#[derive(Clone)]
pub struct TaskClient {
    http: LatticeHttp,
}

impl TaskClient {
    pub fn new(http: LatticeHttp) -> Self {
        Self { http }
    }

    pub async fn create_task(&self, creation: &TaskCreation) -> Result<WireTask> {
        let url = self.http.url(&["tasks"])?;
        debug!(display_name = %creation.display_name, "Creating task");
        self.http.execute_json(self.http.post(url).json(creation)).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<WireTask> {
        let url = self.http.url(&["tasks", task_id])?;
        self.http.execute_json(self.http.get(url)).await
    }

    pub async fn update_task_status(&self, task_id: &str, update: &TaskStatusUpdate) -> Result<()> {
        let url = self.http.url(&["tasks", task_id, "status"])?;
        debug!(
            task_id = %task_id,
            status = %update.new_status.status,
            status_version = update.status_version,
            "Updating task status"
        );
        self.http.execute_empty(self.http.put(url).json(update)).await
    }

    /// Long poll for work addressed to the selected agents
    pub async fn listen_as_agent(&self, listener: &AgentListener) -> Result<AgentRequest> {
        let url = self.http.url(&["agent", "listen"])?;
        self.http
            .execute_json_or_default(self.http.post(url).json(listener))
            .await
    }
}
