//! Reminder repository implementation

use crate::error::{Error, Result};
use crate::models::{Reminder, ReminderId, RepeatRule};
use crate::util::instant_from_millis;
use libsql::{params, Connection, Value};

const REMINDER_COLUMNS: &str = "id, title, description, event_at, timezone, repeat_rule, offsets, \
     enabled, is_deleted, created_at, updated_at";

/// Trait for reminder storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ReminderRepository {
    /// Insert or overwrite a reminder by id
    async fn upsert(&self, reminder: &Reminder) -> Result<()>;

    /// Get a reminder by ID, including tombstones
    async fn get(&self, id: &ReminderId) -> Result<Option<Reminder>>;

    /// List non-deleted reminders ordered by event time
    async fn list(&self, include_disabled: bool) -> Result<Vec<Reminder>>;

    /// Rows (tombstones included) with `updated_at` strictly after the checkpoint, oldest first
    async fn changed_after(&self, checkpoint: i64) -> Result<Vec<Reminder>>;

    /// Tombstone the given ids without touching `updated_at`
    async fn mark_deleted(&self, ids: &[ReminderId]) -> Result<()>;

    /// Last-modified timestamp of a local row, if present
    async fn updated_at(&self, id: &ReminderId) -> Result<Option<i64>>;

    /// Resolve non-deleted reminder ids starting with a prefix
    async fn ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ReminderId>>;
}

/// libSQL implementation of `ReminderRepository`
pub struct LibSqlReminderRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReminderRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a reminder from a database row
    fn parse_reminder(row: &libsql::Row) -> Result<Reminder> {
        let offsets: String = row.get(6)?;
        let repeat: String = row.get(5)?;
        Ok(Reminder {
            id: ReminderId::from(row.get::<String>(0)?),
            title: row.get(1)?,
            description: row.get(2)?,
            event_at: instant_from_millis(row.get(3)?),
            timezone: row.get(4)?,
            repeat: RepeatRule::parse_lenient(&repeat),
            offsets: serde_json::from_str(&offsets).unwrap_or_default(),
            enabled: row.get::<i64>(7)? != 0,
            is_deleted: row.get::<i64>(8)? != 0,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    async fn query_reminders(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Reminder>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut reminders = Vec::new();
        while let Some(row) = rows.next().await? {
            reminders.push(Self::parse_reminder(&row)?);
        }
        Ok(reminders)
    }
}

impl ReminderRepository for LibSqlReminderRepository<'_> {
    async fn upsert(&self, reminder: &Reminder) -> Result<()> {
        let offsets = serde_json::to_string(&reminder.offsets)?;
        let description = reminder
            .description
            .clone()
            .map_or(Value::Null, Value::Text);

        self.conn
            .execute(
                "INSERT INTO reminders (id, title, description, event_at, timezone, repeat_rule,
                     offsets, enabled, is_deleted, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     event_at = excluded.event_at,
                     timezone = excluded.timezone,
                     repeat_rule = excluded.repeat_rule,
                     offsets = excluded.offsets,
                     enabled = excluded.enabled,
                     is_deleted = excluded.is_deleted,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at",
                params![
                    reminder.id.as_str(),
                    reminder.title.as_str(),
                    description,
                    reminder.event_at.timestamp_millis(),
                    reminder.timezone.as_str(),
                    reminder.repeat.as_str(),
                    offsets,
                    i64::from(reminder.enabled),
                    i64::from(reminder.is_deleted),
                    reminder.created_at,
                    reminder.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &ReminderId) -> Result<Option<Reminder>> {
        let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?");
        let mut rows = self.conn.query(&sql, [id.as_str()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_reminder(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, include_disabled: bool) -> Result<Vec<Reminder>> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE is_deleted = 0 AND (enabled = 1 OR ? = 1)
             ORDER BY event_at ASC"
        );
        self.query_reminders(&sql, vec![Value::Integer(i64::from(include_disabled))])
            .await
    }

    async fn changed_after(&self, checkpoint: i64) -> Result<Vec<Reminder>> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE updated_at > ?
             ORDER BY updated_at ASC"
        );
        self.query_reminders(&sql, vec![Value::Integer(checkpoint)])
            .await
    }

    async fn mark_deleted(&self, ids: &[ReminderId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for id in ids {
            if let Err(e) = self
                .conn
                .execute(
                    "UPDATE reminders SET is_deleted = 1, enabled = 0 WHERE id = ?",
                    [id.as_str()],
                )
                .await
            {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn updated_at(&self, id: &ReminderId) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query("SELECT updated_at FROM reminders WHERE id = ?", [id.as_str()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ReminderId>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("id prefix cannot be empty".into()));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM reminders
                 WHERE is_deleted = 0 AND substr(id, 1, length(?1)) = ?1
                 ORDER BY id ASC
                 LIMIT ?2",
                params![prefix, limit],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(ReminderId::from(row.get::<String>(0)?));
        }
        Ok(ids)
    }
}
