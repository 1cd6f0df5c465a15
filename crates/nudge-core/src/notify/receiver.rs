use std::sync::Arc;

use crate::clock::Clock;
use crate::models::{FireState, ReminderId, AT_TIME_OFFSET};
use crate::platform::{AlarmPayload, NotificationImportance, Notifier};
use crate::schedule::{slot_id, SchedulingEngine};
use crate::services::DatabaseService;
use crate::Result;

use super::build_notification;

/// What the receiver did with a fired alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Notification posted
    Delivered {
        recorded: bool,
        rearmed: bool,
    },
    /// The reminder was deleted or disabled after the alarm was armed
    Stale,
}

/// Handles the platform alarm trigger callback and user dismissals.
#[derive(Clone)]
pub struct AlarmReceiver {
    db: DatabaseService,
    engine: SchedulingEngine,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AlarmReceiver {
    pub fn new(
        db: DatabaseService,
        engine: SchedulingEngine,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            engine,
            notifier,
            clock,
        }
    }

    /// Show the alert, record the at-time firing and re-arm repeating reminders.
    ///
    /// Only the at-time slot writes fire-state; early pings are transient.
    pub async fn on_alarm_fired(&self, payload: &AlarmPayload) -> FireOutcome {
        let reminder_id = &payload.reminder_id;

        match self.db.get_reminder(reminder_id).await {
            Ok(Some(reminder)) if reminder.is_active() => {}
            Ok(_) => {
                tracing::debug!(%reminder_id, "Dropping alarm for removed reminder");
                return FireOutcome::Stale;
            }
            Err(e) => {
                // Deliver anyway; a missed alert is worse than a stale one
                tracing::warn!(%reminder_id, error = %e, "Failed to load reminder for fired alarm");
            }
        }

        let notification = build_notification(
            reminder_id,
            payload.offset_millis,
            &payload.title,
            payload.message.as_deref(),
            NotificationImportance::Alert,
        );
        if let Err(e) = self.notifier.show(&notification) {
            tracing::warn!(%reminder_id, error = %e, "Failed to post notification");
        }

        let mut recorded = false;
        if payload.offset_millis == AT_TIME_OFFSET {
            let state = FireState::fired(reminder_id.clone(), AT_TIME_OFFSET, self.clock.now());
            match self.db.upsert_fire_state(&state).await {
                Ok(()) => recorded = true,
                Err(e) => {
                    tracing::warn!(%reminder_id, error = %e, "Failed to record fire state");
                }
            }
        }

        let rearmed = payload.repeat.is_repeating()
            && self.engine.process_repeat_trigger(reminder_id).await.is_some();

        tracing::info!(
            %reminder_id,
            offset_millis = payload.offset_millis,
            recorded,
            rearmed,
            "Alarm fired"
        );
        FireOutcome::Delivered { recorded, rearmed }
    }

    /// Record that the user dismissed a notification.
    pub async fn on_dismissed(&self, reminder_id: &ReminderId, offset_millis: i64) -> Result<()> {
        self.db
            .mark_dismissed(reminder_id, offset_millis, self.clock.now())
            .await?;
        self.notifier.cancel(slot_id(reminder_id, offset_millis));
        Ok(())
    }
}
