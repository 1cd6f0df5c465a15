//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: reminders, fire-state, and sync checkpoints
const V1: [&str; 8] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS reminders (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        event_at INTEGER NOT NULL,
        timezone TEXT NOT NULL,
        repeat_rule TEXT NOT NULL DEFAULT 'none',
        offsets TEXT NOT NULL DEFAULT '[0]',
        enabled INTEGER NOT NULL DEFAULT 1,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reminders_updated ON reminders(updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_reminders_active ON reminders(enabled, is_deleted)",
    // One row per fired (reminder, offset) slot
    "CREATE TABLE IF NOT EXISTS fire_states (
        reminder_id TEXT NOT NULL,
        offset_millis INTEGER NOT NULL,
        last_fired_at INTEGER,
        dismissed_at INTEGER,
        PRIMARY KEY (reminder_id, offset_millis)
    )",
    // Restore path reads only fired-but-undismissed rows
    "CREATE INDEX IF NOT EXISTS idx_fire_states_active ON fire_states(reminder_id)
        WHERE last_fired_at IS NOT NULL AND dismissed_at IS NULL",
    "CREATE TABLE IF NOT EXISTS sync_metadata (
        entity_key TEXT PRIMARY KEY,
        last_local_sync_at INTEGER NOT NULL DEFAULT 0,
        last_remote_sync_at INTEGER NOT NULL DEFAULT 0
    )",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: sync conflict log
const V2: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS sync_conflicts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_key TEXT NOT NULL,
        record_id TEXT NOT NULL,
        local_updated_at INTEGER NOT NULL,
        remote_updated_at INTEGER NOT NULL,
        resolved_at INTEGER NOT NULL,
        resolution TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_record ON sync_conflicts(record_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Run one migration's statements inside a transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
