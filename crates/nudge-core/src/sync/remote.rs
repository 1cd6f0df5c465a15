//! Remote document store: one collection per entity type, one document per
//! record, keyed by the record id.

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database as LibSqlDatabase};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Document fields every synced record carries
pub const FIELD_UID: &str = "uid";
pub const FIELD_ID: &str = "id";
pub const FIELD_UPDATED_AT: &str = "updatedAt";
pub const FIELD_IS_DELETED: &str = "isDeleted";

/// A stored document with its indexed sync fields
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    /// Epoch milliseconds written by the client that last saved it
    pub updated_at: i64,
    pub is_deleted: bool,
    pub body: Value,
}

/// Multi-writer document store shared by all of a user's devices.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RemoteDocument>>;

    /// Overwrite the whole document.
    ///
    /// `body` must carry `uid`, numeric `updatedAt` and may carry `isDeleted`.
    async fn set(&self, collection: &str, id: &str, body: &Value) -> Result<()>;

    /// Documents owned by `uid` with `updatedAt` strictly after `since`,
    /// oldest first.
    async fn changed_since(
        &self,
        collection: &str,
        uid: &str,
        since: i64,
    ) -> Result<Vec<RemoteDocument>>;

    /// Remove tombstones with `updatedAt` before `cutoff`; returns the count.
    async fn purge_tombstones(&self, collection: &str, cutoff: i64) -> Result<u64>;
}

/// Minimal document marking `id` as deleted
pub fn tombstone_document(uid: &str, id: &str, updated_at: i64) -> Value {
    json!({
        "uid": uid,
        "id": id,
        "isDeleted": true,
        "updatedAt": updated_at,
    })
}

struct StoreConnection {
    _db: LibSqlDatabase,
    conn: Connection,
}

/// `DocumentStore` on a libSQL database, either a local file or a remote
/// libSQL server. Clones share one connection.
#[derive(Clone)]
pub struct LibSqlDocumentStore {
    inner: Arc<Mutex<StoreConnection>>,
}

impl LibSqlDocumentStore {
    /// Open (or create) a store in a local file
    pub async fn open_local(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_libsql(db).await
    }

    /// Connect to a libSQL server
    pub async fn open_remote(url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let db = Builder::new_remote(url.into(), auth_token.into())
            .build()
            .await?;
        Self::from_libsql(db).await
    }

    /// In-memory store (for tests and demos)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                uid TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            (),
        )
        .await?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_changes
                ON documents(collection, uid, updated_at)",
            (),
        )
        .await?;

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreConnection { _db: db, conn })),
        })
    }

    fn parse_document(row: &libsql::Row) -> Result<RemoteDocument> {
        let id: String = row.get(0)?;
        let raw: String = row.get(3)?;
        let body = serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(document_id = %id, error = %e, "Stored document body is not JSON");
            Value::Null
        });
        Ok(RemoteDocument {
            id,
            updated_at: row.get(1)?,
            is_deleted: row.get::<i64>(2)? != 0,
            body,
        })
    }

    /// Write a row verbatim, bypassing body validation
    #[cfg(test)]
    pub(crate) async fn insert_raw(
        &self,
        collection: &str,
        id: &str,
        uid: &str,
        updated_at: i64,
        body: &str,
    ) -> Result<()> {
        let inner = self.inner.lock().await;
        inner
            .conn
            .execute(
                "INSERT OR REPLACE INTO documents (collection, id, uid, updated_at, is_deleted, body)
                 VALUES (?, ?, ?, ?, 0, ?)",
                params![collection, id, uid, updated_at, body],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LibSqlDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RemoteDocument>> {
        let inner = self.inner.lock().await;
        let mut rows = inner
            .conn
            .query(
                "SELECT id, updated_at, is_deleted, body FROM documents
                 WHERE collection = ? AND id = ?",
                params![collection, id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, body: &Value) -> Result<()> {
        let uid = body
            .get(FIELD_UID)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Remote(format!("document {id} has no uid")))?;
        let updated_at = body
            .get(FIELD_UPDATED_AT)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Remote(format!("document {id} has no numeric updatedAt")))?;
        let is_deleted = body
            .get(FIELD_IS_DELETED)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let raw = serde_json::to_string(body)?;

        let inner = self.inner.lock().await;
        inner
            .conn
            .execute(
                "INSERT INTO documents (collection, id, uid, updated_at, is_deleted, body)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                     uid = excluded.uid,
                     updated_at = excluded.updated_at,
                     is_deleted = excluded.is_deleted,
                     body = excluded.body",
                params![collection, id, uid, updated_at, i64::from(is_deleted), raw],
            )
            .await?;
        Ok(())
    }

    async fn changed_since(
        &self,
        collection: &str,
        uid: &str,
        since: i64,
    ) -> Result<Vec<RemoteDocument>> {
        let inner = self.inner.lock().await;
        let mut rows = inner
            .conn
            .query(
                "SELECT id, updated_at, is_deleted, body FROM documents
                 WHERE collection = ? AND uid = ? AND updated_at > ?
                 ORDER BY updated_at ASC, id ASC",
                params![collection, uid, since],
            )
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(Self::parse_document(&row)?);
        }
        Ok(documents)
    }

    async fn purge_tombstones(&self, collection: &str, cutoff: i64) -> Result<u64> {
        let inner = self.inner.lock().await;
        let removed = inner
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND is_deleted = 1 AND updated_at < ?",
                params![collection, cutoff],
            )
            .await?;
        Ok(removed)
    }
}
