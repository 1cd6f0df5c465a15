use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::elapsed::ElapsedReminderHandler;
use super::occurrence::next_occurrence;
use super::scheduler::{AlarmContent, AlarmScheduler, ScheduleOutcome};
use crate::clock::Clock;
use crate::models::{Reminder, ReminderId};
use crate::services::DatabaseService;
use crate::Result;

/// Counters from a boot restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootRestoreSummary {
    pub rescheduled: usize,
    pub disabled: usize,
    pub unscheduled: usize,
}

enum RestoreAction {
    Rescheduled(DateTime<Utc>),
    Disabled,
    Unscheduled,
}

/// Composes occurrence math, alarm scheduling and elapsed handling into the
/// save, boot restore and repeat trigger flows.
///
/// Every flow cancels before it schedules, so calling it repeatedly leaves
/// exactly one alarm per slot.
#[derive(Clone)]
pub struct SchedulingEngine {
    db: DatabaseService,
    scheduler: AlarmScheduler,
    elapsed: ElapsedReminderHandler,
    clock: Arc<dyn Clock>,
}

impl SchedulingEngine {
    pub fn new(db: DatabaseService, scheduler: AlarmScheduler, clock: Arc<dyn Clock>) -> Self {
        Self {
            elapsed: ElapsedReminderHandler::new(db.clone()),
            db,
            scheduler,
            clock,
        }
    }

    pub const fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    /// Re-arm a reminder after it was saved.
    ///
    /// `previous_offsets` are the offsets the reminder had before the save;
    /// their alarms are cancelled along with the current ones. Returns the
    /// occurrence that was scheduled, if any.
    pub fn process_saved_reminder(
        &self,
        reminder: &Reminder,
        previous_offsets: &[i64],
    ) -> Option<DateTime<Utc>> {
        let known: Vec<i64> = previous_offsets
            .iter()
            .copied()
            .chain(reminder.effective_offsets())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.scheduler.cancel_all(&reminder.id, &known);

        if !reminder.is_active() {
            return None;
        }
        self.arm_next(reminder, self.clock.now())
    }

    /// Re-arm one reminder after a reboot, retiring it first if its single
    /// occurrence has passed.
    pub async fn process_boot_restore(
        &self,
        reminder: Reminder,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self.restore_one(reminder, now).await {
            RestoreAction::Rescheduled(next) => Some(next),
            RestoreAction::Disabled | RestoreAction::Unscheduled => None,
        }
    }

    /// Run [`Self::process_boot_restore`] for every enabled reminder.
    pub async fn restore_all_after_boot(&self) -> Result<BootRestoreSummary> {
        let reminders = self.db.list_reminders(false).await?;
        let now = self.clock.now();
        let mut summary = BootRestoreSummary::default();

        for reminder in reminders {
            match self.restore_one(reminder, now).await {
                RestoreAction::Rescheduled(_) => summary.rescheduled += 1,
                RestoreAction::Disabled => summary.disabled += 1,
                RestoreAction::Unscheduled => summary.unscheduled += 1,
            }
        }

        tracing::info!(
            rescheduled = summary.rescheduled,
            disabled = summary.disabled,
            unscheduled = summary.unscheduled,
            "Boot restore complete"
        );
        Ok(summary)
    }

    async fn restore_one(&self, mut reminder: Reminder, now: DateTime<Utc>) -> RestoreAction {
        if !reminder.is_active() {
            return RestoreAction::Unscheduled;
        }

        match self.elapsed.handle_if_elapsed(&mut reminder, now).await {
            Ok(true) => {
                self.scheduler
                    .cancel_all(&reminder.id, &reminder.effective_offsets());
                return RestoreAction::Disabled;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    reminder_id = %reminder.id,
                    error = %e,
                    "Failed to check elapsed reminder, leaving it unscheduled"
                );
                return RestoreAction::Unscheduled;
            }
        }

        self.scheduler
            .cancel_all(&reminder.id, &reminder.effective_offsets());
        self.arm_next(&reminder, now)
            .map_or(RestoreAction::Unscheduled, RestoreAction::Rescheduled)
    }

    /// Arm the occurrence after the one that just fired.
    pub async fn process_repeat_trigger(&self, reminder_id: &ReminderId) -> Option<DateTime<Utc>> {
        let reminder = match self.db.get_reminder(reminder_id).await {
            Ok(Some(reminder)) => reminder,
            Ok(None) => {
                tracing::debug!(%reminder_id, "Repeat trigger for unknown reminder");
                return None;
            }
            Err(e) => {
                tracing::warn!(%reminder_id, error = %e, "Failed to load reminder for repeat trigger");
                return None;
            }
        };

        if !reminder.is_active() || !reminder.repeat.is_repeating() {
            return None;
        }

        self.scheduler
            .cancel_all(&reminder.id, &reminder.effective_offsets());
        self.arm_next(&reminder, self.clock.now())
    }

    /// Cancel every known slot of a reminder
    pub fn cancel_reminder(&self, reminder_id: &ReminderId, offsets: &[i64]) {
        self.scheduler.cancel_all(reminder_id, offsets);
    }

    fn arm_next(&self, reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Some(next) = next_occurrence(reminder.event_at, &reminder.timezone, reminder.repeat, now)
        else {
            tracing::debug!(reminder_id = %reminder.id, "No future occurrence, leaving unscheduled");
            return None;
        };

        let outcomes = self.scheduler.schedule_all(
            &reminder.id,
            &AlarmContent::from(reminder),
            next,
            &reminder.effective_offsets(),
        );
        let failed = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ScheduleOutcome::Failed))
            .count();
        if failed > 0 {
            tracing::warn!(reminder_id = %reminder.id, failed, "Some alarms could not be scheduled");
        }
        Some(next)
    }
}
