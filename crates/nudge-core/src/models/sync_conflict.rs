//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an incoming or outgoing write was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Remote document is a tombstone; the local upload was dropped
    RemoteTombstone,
    /// Remote document is newer; the local upload was dropped
    RemoteNewer,
    /// Conflict strategy kept the local record over the remote one
    LocalKept,
}

impl ConflictResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteTombstone => "remote_tombstone",
            Self::RemoteNewer => "remote_newer",
            Self::LocalKept => "local_kept",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "remote_tombstone" => Some(Self::RemoteTombstone),
            "remote_newer" => Some(Self::RemoteNewer),
            "local_kept" => Some(Self::LocalKept),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded sync conflict resolved by the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Entity type key, e.g. `reminders`
    pub entity_key: String,
    /// Record involved in the conflict
    pub record_id: String,
    /// Local row's timestamp when the conflict occurred
    pub local_updated_at: i64,
    /// Remote document's timestamp
    pub remote_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    pub resolution: ConflictResolution,
}
