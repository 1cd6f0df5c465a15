//! Fire-state model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReminderId;

/// Durable fire/dismiss record for one (reminder, offset) alarm slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireState {
    pub reminder_id: ReminderId,
    pub offset_millis: i64,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl FireState {
    /// A freshly fired, not yet dismissed record
    #[must_use]
    pub const fn fired(reminder_id: ReminderId, offset_millis: i64, at: DateTime<Utc>) -> Self {
        Self {
            reminder_id,
            offset_millis,
            last_fired_at: Some(at),
            dismissed_at: None,
        }
    }

    /// Fired and still showing in the tray
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.last_fired_at.is_some() && self.dismissed_at.is_none()
    }
}
