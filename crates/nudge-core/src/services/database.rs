//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{
    Database, FireStateRepository, LibSqlFireStateRepository, LibSqlReminderRepository,
    LibSqlSyncRepository, ReminderRepository, SyncRepository,
};
use crate::models::{FireState, Reminder, ReminderId, SyncConflict, SyncMetadata};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// The local store has a single writer (this process); clones share one
/// connection behind an async mutex.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh store is created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "nudge.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale sidecar file {}", sidecar.display());
            }
        }

        Ok(())
    }

    /// Marker that moves when another process commits to the store.
    ///
    /// Writes through this service (and its clones) leave it unchanged.
    pub async fn external_change_marker(&self) -> Result<i64> {
        let db = self.db.lock().await;
        db.data_version().await
    }

    /// Insert or overwrite a reminder.
    pub async fn save_reminder(&self, reminder: &Reminder) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.upsert(reminder).await
    }

    /// Insert or overwrite many reminders in one transaction.
    pub async fn save_reminders(&self, reminders: &[Reminder]) -> Result<()> {
        if reminders.is_empty() {
            return Ok(());
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        let repo = LibSqlReminderRepository::new(conn);

        conn.execute("BEGIN TRANSACTION", ()).await?;
        for reminder in reminders {
            if let Err(error) = repo.upsert(reminder).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error);
            }
        }
        if let Err(error) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
        Ok(())
    }

    /// Fetch a reminder by id, tombstones included.
    pub async fn get_reminder(&self, id: &ReminderId) -> Result<Option<Reminder>> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.get(id).await
    }

    /// List non-deleted reminders ordered by event time.
    pub async fn list_reminders(&self, include_disabled: bool) -> Result<Vec<Reminder>> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.list(include_disabled).await
    }

    /// Rows changed after a push checkpoint, tombstones included.
    pub async fn reminders_changed_after(&self, checkpoint: i64) -> Result<Vec<Reminder>> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.changed_after(checkpoint).await
    }

    /// Tombstone reminders without bumping `updated_at`.
    pub async fn mark_reminders_deleted(&self, ids: &[ReminderId]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.mark_deleted(ids).await
    }

    /// Last-modified timestamp of a local reminder row.
    pub async fn reminder_updated_at(&self, id: &ReminderId) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.updated_at(id).await
    }

    /// Resolve reminder ids by unique prefix.
    pub async fn reminder_ids_by_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ReminderId>> {
        let db = self.db.lock().await;
        let repo = LibSqlReminderRepository::new(db.connection());
        repo.ids_by_prefix(prefix, limit).await
    }

    /// Record a fired alarm slot.
    pub async fn upsert_fire_state(&self, state: &FireState) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.upsert(state).await
    }

    /// When a (reminder, offset) slot last fired.
    pub async fn last_fired_at(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.last_fired_at(reminder_id, offset_millis).await
    }

    /// All fire-state rows for a reminder.
    pub async fn fire_states_for(&self, reminder_id: &ReminderId) -> Result<Vec<FireState>> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.all_for_reminder(reminder_id).await
    }

    /// Mark a fired slot as dismissed by the user.
    pub async fn mark_dismissed(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.mark_dismissed(reminder_id, offset_millis, at).await
    }

    /// Fired-but-undismissed slots.
    pub async fn active_fire_states(&self) -> Result<Vec<FireState>> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.active_fired().await
    }

    /// Drop fire-state of a deleted reminder.
    pub async fn delete_fire_states(&self, reminder_id: &ReminderId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlFireStateRepository::new(db.connection());
        repo.delete_for_reminder(reminder_id).await
    }

    /// Load sync checkpoints for an entity type.
    pub async fn sync_metadata(&self, entity_key: &str) -> Result<SyncMetadata> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.load_metadata(entity_key).await
    }

    /// Move the push checkpoint forward.
    pub async fn advance_local_checkpoint(&self, entity_key: &str, at: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.advance_local_checkpoint(entity_key, at).await
    }

    /// Move the pull checkpoint forward.
    pub async fn advance_remote_checkpoint(&self, entity_key: &str, at: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.advance_remote_checkpoint(entity_key, at).await
    }

    /// Append to the sync conflict log.
    pub async fn record_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.record_conflict(conflict).await
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReminderDraft, RepeatRule};

    fn reminder(title: &str) -> Reminder {
        Reminder::from_draft(
            ReminderDraft {
                title: title.to_string(),
                description: None,
                event_at: Utc::now(),
                timezone: "UTC".to_string(),
                repeat: RepeatRule::None,
                offsets: vec![0],
            },
            1,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_save_and_list_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        service
            .save_reminders(&[reminder("one"), reminder("two")])
            .await
            .unwrap();
        let reminders = service.list_reminders(false).await.unwrap();
        assert_eq!(reminders.len(), 2);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(DatabaseService::is_corrupted_db_error(
            &crate::Error::Database("SQLite failure: file is not a database".to_string())
        ));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("reminder title cannot be empty".to_string())
        ));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let test_dir = tempfile::tempdir().unwrap();
        let db_path = test_dir.path().join("nudge.db");
        let wal_path = test_dir.path().join("nudge.db-wal");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        DatabaseService::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        let found_backup = std::fs::read_dir(test_dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("nudge.db.corrupt-")
            });
        assert!(found_backup);
    }
}
