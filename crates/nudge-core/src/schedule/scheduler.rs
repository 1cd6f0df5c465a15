use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::alarm_id::slot_id;
use crate::clock::Clock;
use crate::models::{Reminder, ReminderId, RepeatRule};
use crate::platform::{AlarmPayload, AlarmPlatform, AlarmPrecision, PlatformError};

/// Per-reminder content copied into every alarm payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmContent {
    pub title: String,
    pub message: Option<String>,
    pub repeat: RepeatRule,
}

impl From<&Reminder> for AlarmContent {
    fn from(reminder: &Reminder) -> Self {
        Self {
            title: reminder.title.clone(),
            message: reminder.description.clone(),
            repeat: reminder.repeat,
        }
    }
}

/// Result of arming a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled {
        alarm_id: i32,
        trigger_at: DateTime<Utc>,
        precision: AlarmPrecision,
    },
    /// Trigger time was not in the future
    Elapsed,
    /// Every precision tier was refused, or the trigger time is unrepresentable
    Failed,
}

/// Arms and disarms one platform alarm per `(reminder, offset)` slot.
///
/// Failures never propagate; they are logged and reported as
/// [`ScheduleOutcome::Failed`].
#[derive(Clone)]
pub struct AlarmScheduler {
    platform: Arc<dyn AlarmPlatform>,
    clock: Arc<dyn Clock>,
}

impl AlarmScheduler {
    pub fn new(platform: Arc<dyn AlarmPlatform>, clock: Arc<dyn Clock>) -> Self {
        Self { platform, clock }
    }

    /// Arm the slot for `offset_millis` before `event_at`
    pub fn schedule_exact(
        &self,
        reminder_id: &ReminderId,
        event_at: DateTime<Utc>,
        offset_millis: i64,
        content: &AlarmContent,
    ) -> ScheduleOutcome {
        let Some(trigger_at) = Duration::try_milliseconds(offset_millis)
            .and_then(|offset| event_at.checked_sub_signed(offset))
        else {
            tracing::error!(
                reminder_id = %reminder_id.as_str(),
                offset_millis,
                %event_at,
                "Alarm trigger time is out of range"
            );
            return ScheduleOutcome::Failed;
        };
        if trigger_at <= self.clock.now() {
            tracing::debug!(
                reminder_id = %reminder_id.as_str(),
                offset_millis,
                %trigger_at,
                "Skipping alarm whose trigger time has passed"
            );
            return ScheduleOutcome::Elapsed;
        }

        let alarm_id = slot_id(reminder_id, offset_millis);
        let payload = AlarmPayload {
            reminder_id: reminder_id.clone(),
            offset_millis,
            event_at,
            title: content.title.clone(),
            message: content.message.clone(),
            repeat: content.repeat,
        };

        let preferred = if self.platform.can_schedule_exact_alarms() {
            AlarmPrecision::ExactAllowWhileIdle
        } else {
            AlarmPrecision::Exact
        };

        let precision = match self
            .platform
            .set_alarm(alarm_id, trigger_at, preferred, &payload)
        {
            Ok(()) => preferred,
            Err(PlatformError::PermissionDenied(reason)) => {
                tracing::warn!(
                    reminder_id = %reminder_id.as_str(),
                    offset_millis,
                    %reason,
                    "Exact alarm refused, falling back to inexact"
                );
                if let Err(e) = self.platform.set_alarm(
                    alarm_id,
                    trigger_at,
                    AlarmPrecision::Inexact,
                    &payload,
                ) {
                    tracing::error!(
                        reminder_id = %reminder_id.as_str(),
                        offset_millis,
                        error = %e,
                        "Failed to schedule alarm"
                    );
                    return ScheduleOutcome::Failed;
                }
                AlarmPrecision::Inexact
            }
            Err(e) => {
                tracing::error!(
                    reminder_id = %reminder_id.as_str(),
                    offset_millis,
                    error = %e,
                    "Failed to schedule alarm"
                );
                return ScheduleOutcome::Failed;
            }
        };

        tracing::debug!(
            reminder_id = %reminder_id.as_str(),
            offset_millis,
            alarm_id,
            %trigger_at,
            ?precision,
            "Scheduled alarm"
        );
        ScheduleOutcome::Scheduled {
            alarm_id,
            trigger_at,
            precision,
        }
    }

    /// Arm one slot per distinct offset for the given occurrence
    pub fn schedule_all(
        &self,
        reminder_id: &ReminderId,
        content: &AlarmContent,
        event_at: DateTime<Utc>,
        offsets: &[i64],
    ) -> Vec<ScheduleOutcome> {
        offsets
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|offset| self.schedule_exact(reminder_id, event_at, offset, content))
            .collect()
    }

    /// Disarm every slot for the given offsets; missing alarms are ignored
    pub fn cancel_all(&self, reminder_id: &ReminderId, offsets: &[i64]) {
        for offset in offsets.iter().copied().collect::<BTreeSet<_>>() {
            self.platform.cancel_alarm(slot_id(reminder_id, offset));
        }
    }
}
