//! Shared sync status for frontends.

use crate::sync::SyncOutcome;

/// Coarse sync status shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

impl From<&SyncOutcome> for SyncState {
    fn from(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::NotAuthenticated | SyncOutcome::NotConfigured => Self::Offline,
            SyncOutcome::Completed(_) => Self::Synced,
            SyncOutcome::Retry { .. } => Self::Error,
        }
    }
}
