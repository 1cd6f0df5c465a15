//! User-facing reminder operations that keep alarms in step with the store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{Reminder, ReminderDraft, ReminderId};
use crate::schedule::{BootRestoreSummary, SchedulingEngine};
use crate::services::DatabaseService;
use crate::sync::{SyncEngine, SyncOutcome, REMINDERS_ENTITY_KEY};

/// A persisted reminder and the occurrence now armed for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReminder {
    pub reminder: Reminder,
    pub next_occurrence: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ReminderService {
    db: DatabaseService,
    engine: SchedulingEngine,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(db: DatabaseService, engine: SchedulingEngine, clock: Arc<dyn Clock>) -> Self {
        Self { db, engine, clock }
    }

    pub async fn create(&self, draft: ReminderDraft) -> Result<SavedReminder> {
        let reminder = Reminder::from_draft(draft, self.clock.now_millis())?;
        self.db.save_reminder(&reminder).await?;
        tracing::info!(reminder_id = %reminder.id, "Created reminder");
        Ok(self.arm(reminder, &[]))
    }

    pub async fn update(&self, id: &ReminderId, draft: ReminderDraft) -> Result<SavedReminder> {
        let mut reminder = self.get(id).await?;
        let previous = reminder.effective_offsets();
        reminder.apply_draft(draft, self.clock.now_millis())?;
        self.db.save_reminder(&reminder).await?;
        Ok(self.arm(reminder, &previous))
    }

    pub async fn set_enabled(&self, id: &ReminderId, enabled: bool) -> Result<SavedReminder> {
        let mut reminder = self.get(id).await?;
        if reminder.enabled != enabled {
            reminder.enabled = enabled;
            reminder.touch(self.clock.now_millis());
            self.db.save_reminder(&reminder).await?;
        }
        let offsets = reminder.effective_offsets();
        Ok(self.arm(reminder, &offsets))
    }

    /// Soft-delete, so the delete can travel to other devices as a tombstone.
    pub async fn delete(&self, id: &ReminderId) -> Result<()> {
        let mut reminder = self.get(id).await?;
        reminder.is_deleted = true;
        reminder.enabled = false;
        reminder.touch(self.clock.now_millis());
        self.db.save_reminder(&reminder).await?;

        self.engine
            .cancel_reminder(&reminder.id, &reminder.effective_offsets());
        self.db.delete_fire_states(&reminder.id).await?;
        tracing::info!(reminder_id = %reminder.id, "Deleted reminder");
        Ok(())
    }

    /// Fetch a live (non-deleted) reminder
    pub async fn get(&self, id: &ReminderId) -> Result<Reminder> {
        self.db
            .get_reminder(id)
            .await?
            .filter(|reminder| !reminder.is_deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn list(&self, include_disabled: bool) -> Result<Vec<Reminder>> {
        self.db.list_reminders(include_disabled).await
    }

    /// Resolve a full id or unique id prefix
    pub async fn resolve_id(&self, prefix: &str) -> Result<ReminderId> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("reminder id cannot be empty".into()));
        }
        let mut matches = self.db.reminder_ids_by_prefix(prefix, 2).await?;
        match matches.len() {
            0 => Err(Error::NotFound(prefix.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::InvalidInput(format!(
                "reminder id prefix '{prefix}' is ambiguous"
            ))),
        }
    }

    /// Re-arm every reminder after a reboot
    pub async fn restore_after_boot(&self) -> Result<BootRestoreSummary> {
        self.engine.restore_all_after_boot().await
    }

    /// Run a sync pass and re-arm or cancel alarms for what it changed.
    pub async fn sync(&self, sync: &SyncEngine) -> SyncOutcome {
        // Offsets as armed before the pass, so removed offsets get cancelled
        let known_offsets: HashMap<ReminderId, Vec<i64>> = match self.db.list_reminders(true).await {
            Ok(reminders) => reminders
                .into_iter()
                .map(|reminder| {
                    let offsets = reminder.effective_offsets();
                    (reminder.id, offsets)
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to snapshot reminders before sync");
                HashMap::new()
            }
        };

        let outcome = sync.sync_all().await;

        for report in outcome
            .reports()
            .iter()
            .filter(|report| report.entity_key == REMINDERS_ENTITY_KEY)
        {
            let deleted: BTreeSet<&String> = report.deleted_ids.iter().collect();
            for id in &deleted {
                self.forget(&ReminderId::from(id.as_str()), &known_offsets).await;
            }
            for id in report.applied_ids.iter().filter(|id| !deleted.contains(id)) {
                let id = ReminderId::from(id.as_str());
                match self.db.get_reminder(&id).await {
                    Ok(Some(reminder)) => {
                        let previous = known_offsets.get(&id).cloned().unwrap_or_default();
                        self.engine.process_saved_reminder(&reminder, &previous);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(reminder_id = %id, error = %e, "Failed to re-arm synced reminder"),
                }
            }
        }
        outcome
    }

    async fn forget(&self, id: &ReminderId, known_offsets: &HashMap<ReminderId, Vec<i64>>) {
        let offsets = match known_offsets.get(id) {
            Some(offsets) => offsets.clone(),
            None => match self.db.get_reminder(id).await {
                Ok(Some(reminder)) => reminder.effective_offsets(),
                _ => Vec::new(),
            },
        };
        self.engine.cancel_reminder(id, &offsets);
        if let Err(e) = self.db.delete_fire_states(id).await {
            tracing::warn!(reminder_id = %id, error = %e, "Failed to drop fire state of deleted reminder");
        }
    }

    fn arm(&self, reminder: Reminder, previous_offsets: &[i64]) -> SavedReminder {
        let next_occurrence = self
            .engine
            .process_saved_reminder(&reminder, previous_offsets);
        SavedReminder {
            reminder,
            next_occurrence,
        }
    }
}
