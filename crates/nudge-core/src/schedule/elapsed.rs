use chrono::{DateTime, Utc};

use crate::models::Reminder;
use crate::services::DatabaseService;
use crate::Result;

/// Retires one-time reminders whose single occurrence has passed, typically
/// while no alarm could fire (device off, process killed).
#[derive(Clone)]
pub struct ElapsedReminderHandler {
    db: DatabaseService,
}

impl ElapsedReminderHandler {
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Disable `reminder` if it is an enabled one-time reminder whose anchor
    /// is strictly before `now`, persisting the change.
    ///
    /// Returns `true` when the reminder was disabled. Repeating reminders are
    /// never touched here.
    pub async fn handle_if_elapsed(
        &self,
        reminder: &mut Reminder,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if reminder.is_deleted
            || !reminder.enabled
            || reminder.repeat.is_repeating()
            || reminder.event_at >= now
        {
            return Ok(false);
        }

        reminder.enabled = false;
        reminder.touch(now.timestamp_millis());
        self.db.save_reminder(reminder).await?;
        tracing::info!(reminder_id = %reminder.id, "Disabled elapsed one-time reminder");
        Ok(true)
    }
}
