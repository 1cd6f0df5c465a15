//! Sync checkpoint and conflict log repository

use crate::error::Result;
use crate::models::{ConflictResolution, SyncConflict, SyncMetadata};
use libsql::{params, Connection};

/// Trait for sync bookkeeping storage (async)
#[allow(async_fn_in_trait)]
pub trait SyncRepository {
    /// Load checkpoints for an entity type; zeroes when never synced
    async fn load_metadata(&self, entity_key: &str) -> Result<SyncMetadata>;

    /// Advance the push checkpoint; never moves it backwards
    async fn advance_local_checkpoint(&self, entity_key: &str, at: i64) -> Result<()>;

    /// Advance the pull checkpoint; never moves it backwards
    async fn advance_remote_checkpoint(&self, entity_key: &str, at: i64) -> Result<()>;

    /// Append a conflict to the log
    async fn record_conflict(&self, conflict: &SyncConflict) -> Result<()>;

    /// Most recently resolved conflicts first
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `SyncRepository`
pub struct LibSqlSyncRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncRepository for LibSqlSyncRepository<'_> {
    async fn load_metadata(&self, entity_key: &str) -> Result<SyncMetadata> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_local_sync_at, last_remote_sync_at FROM sync_metadata WHERE entity_key = ?",
                [entity_key],
            )
            .await?;

        let mut metadata = SyncMetadata::new(entity_key);
        if let Some(row) = rows.next().await? {
            metadata.last_local_sync_at = row.get(0)?;
            metadata.last_remote_sync_at = row.get(1)?;
        }
        Ok(metadata)
    }

    async fn advance_local_checkpoint(&self, entity_key: &str, at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_metadata (entity_key, last_local_sync_at) VALUES (?1, ?2)
                 ON CONFLICT(entity_key) DO UPDATE SET
                     last_local_sync_at = MAX(last_local_sync_at, excluded.last_local_sync_at)",
                params![entity_key, at],
            )
            .await?;
        Ok(())
    }

    async fn advance_remote_checkpoint(&self, entity_key: &str, at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_metadata (entity_key, last_remote_sync_at) VALUES (?1, ?2)
                 ON CONFLICT(entity_key) DO UPDATE SET
                     last_remote_sync_at = MAX(last_remote_sync_at, excluded.last_remote_sync_at)",
                params![entity_key, at],
            )
            .await?;
        Ok(())
    }

    async fn record_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_conflicts
                     (entity_key, record_id, local_updated_at, remote_updated_at, resolved_at, resolution)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    conflict.entity_key.as_str(),
                    conflict.record_id.as_str(),
                    conflict.local_updated_at,
                    conflict.remote_updated_at,
                    conflict.resolved_at,
                    conflict.resolution.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id, entity_key, record_id, local_updated_at, remote_updated_at, resolved_at, resolution
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                [limit],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let resolution: String = row.get(6)?;
            let Some(resolution) = ConflictResolution::parse(&resolution) else {
                tracing::warn!("Skipping sync conflict with unknown resolution '{resolution}'");
                continue;
            };
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                entity_key: row.get(1)?,
                record_id: row.get(2)?,
                local_updated_at: row.get(3)?,
                remote_updated_at: row.get(4)?,
                resolved_at: row.get(5)?,
                resolution,
            });
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_checkpoints_only_move_forward() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRepository::new(db.connection());

        let fresh = repo.load_metadata("reminders").await.unwrap();
        assert_eq!(fresh.last_local_sync_at, 0);
        assert_eq!(fresh.last_remote_sync_at, 0);

        repo.advance_local_checkpoint("reminders", 500).await.unwrap();
        repo.advance_local_checkpoint("reminders", 300).await.unwrap();
        repo.advance_remote_checkpoint("reminders", 700).await.unwrap();

        let metadata = repo.load_metadata("reminders").await.unwrap();
        assert_eq!(metadata.last_local_sync_at, 500);
        assert_eq!(metadata.last_remote_sync_at, 700);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflicts_listed_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRepository::new(db.connection());

        for (record, resolved_at) in [("a", 10), ("b", 30), ("c", 20)] {
            repo.record_conflict(&SyncConflict {
                id: 0,
                entity_key: "reminders".to_string(),
                record_id: record.to_string(),
                local_updated_at: 1,
                remote_updated_at: 2,
                resolved_at,
                resolution: ConflictResolution::RemoteNewer,
            })
            .await
            .unwrap();
        }

        let conflicts = repo.list_conflicts(2).await.unwrap();
        let records: Vec<_> = conflicts.iter().map(|c| c.record_id.as_str()).collect();
        assert_eq!(records, vec!["b", "c"]);
    }
}
