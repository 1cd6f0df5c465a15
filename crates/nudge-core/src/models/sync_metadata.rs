//! Sync checkpoint model

use serde::{Deserialize, Serialize};

/// Per-entity sync checkpoints (Unix ms); both only move forward
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Entity type key, e.g. `reminders`
    pub entity_key: String,
    /// Highest local `updatedAt` pushed to the remote store
    pub last_local_sync_at: i64,
    /// Highest remote `updatedAt` pulled into the local store
    pub last_remote_sync_at: i64,
}

impl SyncMetadata {
    #[must_use]
    pub fn new(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            ..Self::default()
        }
    }
}
