//! Outstanding investigation tasks, per asset and per track
//!
//! An entity id maps to at most one task id. Entries are written after a
//! task is created and removed only once a status check reports the task
//! is no longer active; evicting the entity from its entity cache leaves
//! the ledger untouched. Both sides are bounded LRU caches, so abandoned
//! entries eventually age out.

use recon_common::TaskId;

use crate::cache::BoundedCache;

pub struct TaskLedger {
    assets: BoundedCache<String, TaskId>,
    tracks: BoundedCache<String, TaskId>,
}

impl TaskLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            assets: BoundedCache::new(capacity),
            tracks: BoundedCache::new(capacity),
        }
    }

    pub async fn asset_task(&self, asset_id: &str) -> Option<TaskId> {
        self.assets.get(asset_id).await
    }

    pub async fn track_task(&self, track_id: &str) -> Option<TaskId> {
        self.tracks.get(track_id).await
    }

    /// Record `task_id` under both the asset and the track
    pub async fn record(&self, asset_id: &str, track_id: &str, task_id: TaskId) {
        self.assets.put(asset_id.to_string(), task_id.clone()).await;
        self.tracks.put(track_id.to_string(), task_id).await;
    }

    pub async fn clear_asset(&self, asset_id: &str) -> Option<TaskId> {
        self.assets.remove(asset_id).await
    }

    pub async fn clear_track(&self, track_id: &str) -> Option<TaskId> {
        self.tracks.remove(track_id).await
    }

    pub async fn asset_entries(&self) -> usize {
        self.assets.len().await
    }

    pub async fn track_entries(&self) -> usize {
        self.tracks.len().await
    }
}
