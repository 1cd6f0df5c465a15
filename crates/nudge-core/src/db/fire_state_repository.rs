//! Fire-state repository implementation

use crate::error::Result;
use crate::models::{FireState, ReminderId};
use crate::util::instant_from_millis;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Value};

/// Trait for fire-state storage operations (async)
#[allow(async_fn_in_trait)]
pub trait FireStateRepository {
    /// Insert or overwrite the record for its (reminder, offset) slot
    async fn upsert(&self, state: &FireState) -> Result<()>;

    /// When the slot last fired, if ever
    async fn last_fired_at(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Every record belonging to one reminder
    async fn all_for_reminder(&self, reminder_id: &ReminderId) -> Result<Vec<FireState>>;

    /// Set `dismissed_at` on an existing slot
    async fn mark_dismissed(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Fired and not yet dismissed records
    async fn active_fired(&self) -> Result<Vec<FireState>>;

    /// Drop every record of a deleted reminder
    async fn delete_for_reminder(&self, reminder_id: &ReminderId) -> Result<()>;
}

/// libSQL implementation of `FireStateRepository`
pub struct LibSqlFireStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlFireStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_state(row: &libsql::Row) -> Result<FireState> {
        Ok(FireState {
            reminder_id: ReminderId::from(row.get::<String>(0)?),
            offset_millis: row.get(1)?,
            last_fired_at: row.get::<Option<i64>>(2)?.map(instant_from_millis),
            dismissed_at: row.get::<Option<i64>>(3)?.map(instant_from_millis),
        })
    }

    fn optional_millis(value: Option<DateTime<Utc>>) -> Value {
        value.map_or(Value::Null, |at| Value::Integer(at.timestamp_millis()))
    }
}

impl FireStateRepository for LibSqlFireStateRepository<'_> {
    async fn upsert(&self, state: &FireState) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO fire_states
                     (reminder_id, offset_millis, last_fired_at, dismissed_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    state.reminder_id.as_str(),
                    state.offset_millis,
                    Self::optional_millis(state.last_fired_at),
                    Self::optional_millis(state.dismissed_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn last_fired_at(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_fired_at FROM fire_states WHERE reminder_id = ? AND offset_millis = ?",
                params![reminder_id.as_str(), offset_millis],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0)?.map(instant_from_millis)),
            None => Ok(None),
        }
    }

    async fn all_for_reminder(&self, reminder_id: &ReminderId) -> Result<Vec<FireState>> {
        let mut rows = self
            .conn
            .query(
                "SELECT reminder_id, offset_millis, last_fired_at, dismissed_at
                 FROM fire_states WHERE reminder_id = ? ORDER BY offset_millis ASC",
                [reminder_id.as_str()],
            )
            .await?;
        let mut states = Vec::new();
        while let Some(row) = rows.next().await? {
            states.push(Self::parse_state(&row)?);
        }
        Ok(states)
    }

    async fn mark_dismissed(
        &self,
        reminder_id: &ReminderId,
        offset_millis: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE fire_states SET dismissed_at = ? WHERE reminder_id = ? AND offset_millis = ?",
                params![at.timestamp_millis(), reminder_id.as_str(), offset_millis],
            )
            .await?;
        Ok(())
    }

    async fn active_fired(&self) -> Result<Vec<FireState>> {
        // Predicate matches the partial index idx_fire_states_active
        let mut rows = self
            .conn
            .query(
                "SELECT reminder_id, offset_millis, last_fired_at, dismissed_at
                 FROM fire_states
                 WHERE last_fired_at IS NOT NULL AND dismissed_at IS NULL
                 ORDER BY last_fired_at ASC",
                (),
            )
            .await?;
        let mut states = Vec::new();
        while let Some(row) = rows.next().await? {
            states.push(Self::parse_state(&row)?);
        }
        Ok(states)
    }

    async fn delete_for_reminder(&self, reminder_id: &ReminderId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM fire_states WHERE reminder_id = ?",
                [reminder_id.as_str()],
            )
            .await?;
        Ok(())
    }
}
