use std::sync::Arc;

use crate::auth::SessionProvider;
use crate::platform::{NotificationImportance, Notifier};
use crate::services::DatabaseService;

use super::build_notification;

/// Re-posts fired-but-undismissed notifications after a cold start.
///
/// Read-only: no fire-state or reminder writes, no alarms.
#[derive(Clone)]
pub struct NotificationRestoreManager {
    db: DatabaseService,
    notifier: Arc<dyn Notifier>,
    session: Arc<dyn SessionProvider>,
}

impl NotificationRestoreManager {
    pub fn new(
        db: DatabaseService,
        notifier: Arc<dyn Notifier>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            db,
            notifier,
            session,
        }
    }

    /// Returns the number of notifications re-posted.
    pub async fn restore_active_notifications(&self) -> usize {
        if self.session.current_user_id().is_none() {
            return 0;
        }

        let states = match self.db.active_fire_states().await {
            Ok(states) => states,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load active notifications");
                return 0;
            }
        };

        let mut restored = 0;
        for state in states {
            let reminder = match self.db.get_reminder(&state.reminder_id).await {
                Ok(Some(reminder)) if reminder.is_active() => reminder,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(reminder_id = %state.reminder_id, error = %e, "Failed to load reminder");
                    continue;
                }
            };

            let notification = build_notification(
                &reminder.id,
                state.offset_millis,
                &reminder.title,
                reminder.description.as_deref(),
                NotificationImportance::Silent,
            );
            match self.notifier.show(&notification) {
                Ok(()) => restored += 1,
                Err(e) => {
                    tracing::warn!(reminder_id = %reminder.id, error = %e, "Failed to restore notification");
                }
            }
        }

        tracing::debug!(restored, "Restored active notifications");
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSession;
    use crate::models::{FireState, Reminder, RepeatRule};
    use crate::schedule::slot_id;
    use crate::testing::{draft, RecordingNotifier};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    async fn reminder(db: &DatabaseService, title: &str) -> Reminder {
        let reminder = Reminder::from_draft(
            draft(title, Utc::now() - Duration::minutes(5), RepeatRule::None, vec![]),
            1,
        )
        .unwrap();
        db.save_reminder(&reminder).await.unwrap();
        db.upsert_fire_state(&FireState::fired(reminder.id.clone(), 0, Utc::now()))
            .await
            .unwrap();
        reminder
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reposts_active_notifications_silently() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let active = reminder(&db, "Take pills").await;
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = NotificationRestoreManager::new(
            db,
            notifier.clone(),
            Arc::new(StaticSession::new(Some("user-1".into()), None)),
        );

        assert_eq!(manager.restore_active_notifications().await, 1);

        let shown = notifier.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, slot_id(&active.id, 0));
        assert_eq!(shown[0].importance, NotificationImportance::Silent);
        assert_eq!(shown[0].title, "Take pills");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skips_dismissed_disabled_and_deleted() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let dismissed = reminder(&db, "Dismissed").await;
        db.mark_dismissed(&dismissed.id, 0, Utc::now()).await.unwrap();
        let mut disabled = reminder(&db, "Disabled").await;
        disabled.enabled = false;
        db.save_reminder(&disabled).await.unwrap();
        let deleted = reminder(&db, "Deleted").await;
        db.mark_reminders_deleted(std::slice::from_ref(&deleted.id))
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let manager = NotificationRestoreManager::new(
            db,
            notifier.clone(),
            Arc::new(StaticSession::new(Some("user-1".into()), None)),
        );

        assert_eq!(manager.restore_active_notifications().await, 0);
        assert!(notifier.shown().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn signed_out_is_a_no_op() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        reminder(&db, "Take pills").await;
        let notifier = Arc::new(RecordingNotifier::default());
        let manager =
            NotificationRestoreManager::new(db, notifier.clone(), Arc::new(StaticSession::signed_out()));

        assert_eq!(manager.restore_active_notifications().await, 0);
        assert!(notifier.shown().is_empty());
    }
}
