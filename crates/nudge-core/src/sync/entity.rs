//! Per-entity sync configuration and the push/pull passes over it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::remote::{tombstone_document, DocumentStore};
use crate::models::{ConflictResolution, SyncConflict};
use crate::services::DatabaseService;
use crate::Result;

/// Which side wins when both changed since the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Always apply the remote document
    RemoteWins,
    /// Apply remote only for new records or ones changed after our last push
    LocalWins,
    /// Apply remote when its `updatedAt` is after our last push
    #[default]
    LatestUpdatedWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    #[default]
    Bidirectional,
    PushOnly,
    PullOnly,
}

impl SyncDirection {
    const fn pushes(self) -> bool {
        matches!(self, Self::Bidirectional | Self::PushOnly)
    }

    const fn pulls(self) -> bool {
        matches!(self, Self::Bidirectional | Self::PullOnly)
    }
}

/// Mapping between a local record type and its remote document.
pub trait SyncEntity: Send + Sync + 'static {
    type Local: Send + Sync + 'static;

    fn to_remote(&self, local: &Self::Local, uid: &str) -> Value;

    /// Never fails: malformed documents map to a safe default record.
    fn from_remote(&self, id: &str, document: &Value) -> Self::Local;

    fn local_id(&self, local: &Self::Local) -> String;
    fn updated_at(&self, local: &Self::Local) -> i64;
    fn is_deleted(&self, local: &Self::Local) -> bool;
}

/// Local store access needed by the sync passes
#[async_trait]
pub trait SyncDao<T>: Send + Sync {
    /// Rows with `updatedAt` after `checkpoint`, oldest first, tombstones included
    async fn locals_changed_after(&self, checkpoint: i64) -> Result<Vec<T>>;
    async fn upsert_all(&self, records: Vec<T>) -> Result<()>;
    /// Tombstone rows without touching their `updatedAt`
    async fn mark_deleted_by_ids(&self, ids: &[String]) -> Result<()>;
    async fn local_updated_at(&self, id: &str) -> Result<Option<i64>>;
}

/// Everything a pass needs besides its entity config
pub struct SyncContext<'a> {
    pub uid: &'a str,
    pub remote: &'a dyn DocumentStore,
    pub db: &'a DatabaseService,
    pub now_millis: i64,
}

/// What one entity's sync pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySyncReport {
    pub entity_key: String,
    pub uploaded: usize,
    pub tombstones_pushed: usize,
    /// Uploads refused because the remote side was newer or deleted
    pub conflicts: usize,
    /// Rows or documents that failed and will be retried
    pub failed: usize,
    /// Local ids created or overwritten from remote
    pub applied_ids: Vec<String>,
    /// Local ids tombstoned from remote
    pub deleted_ids: Vec<String>,
}

/// Type-erased view of an entity config, so the engine can hold a list of them
#[async_trait]
pub trait EntitySync: Send + Sync {
    fn entity_key(&self) -> &str;
    fn collection(&self) -> &str;
    async fn sync(&self, ctx: &SyncContext<'_>) -> Result<EntitySyncReport>;
}

/// Sync configuration for one entity type
pub struct EntitySyncConfig<E: SyncEntity> {
    pub entity_key: String,
    pub collection: String,
    pub strategy: ConflictStrategy,
    pub direction: SyncDirection,
    pub entity: E,
    pub dao: Arc<dyn SyncDao<E::Local>>,
}

enum PushAction {
    Uploaded,
    TombstonePushed,
    AlreadyPushed,
    Refused,
}

impl<E: SyncEntity> EntitySyncConfig<E> {
    async fn record_conflict(
        &self,
        ctx: &SyncContext<'_>,
        record_id: &str,
        local_updated_at: i64,
        remote_updated_at: i64,
        resolution: ConflictResolution,
    ) {
        let conflict = SyncConflict {
            id: 0,
            entity_key: self.entity_key.clone(),
            record_id: record_id.to_string(),
            local_updated_at,
            remote_updated_at,
            resolved_at: ctx.now_millis,
            resolution,
        };
        if let Err(e) = ctx.db.record_conflict(&conflict).await {
            tracing::warn!(record_id, error = %e, "Failed to record sync conflict");
        }
    }

    async fn push(&self, ctx: &SyncContext<'_>, report: &mut EntitySyncReport) -> Result<()> {
        let checkpoint = ctx.db.sync_metadata(&self.entity_key).await?.last_local_sync_at;
        let rows = self.dao.locals_changed_after(checkpoint).await?;
        let mut advanced = checkpoint;
        let mut blocked = false;

        for local in rows {
            let id = self.entity.local_id(&local);
            match self.push_one(ctx, &local, &id, checkpoint, report).await {
                Ok(action) => {
                    match action {
                        PushAction::Uploaded => report.uploaded += 1,
                        PushAction::TombstonePushed => report.tombstones_pushed += 1,
                        PushAction::Refused => report.conflicts += 1,
                        PushAction::AlreadyPushed => {}
                    }
                    // Rows arrive oldest first; never step past a failed one
                    if !blocked {
                        advanced = advanced.max(self.entity.updated_at(&local));
                    }
                }
                Err(e) => {
                    tracing::warn!(entity = %self.entity_key, record_id = %id, error = %e, "Failed to push record");
                    report.failed += 1;
                    blocked = true;
                }
            }
        }

        if advanced > checkpoint {
            ctx.db
                .advance_local_checkpoint(&self.entity_key, advanced)
                .await?;
        }
        Ok(())
    }

    async fn push_one(
        &self,
        ctx: &SyncContext<'_>,
        local: &E::Local,
        id: &str,
        checkpoint: i64,
        report: &mut EntitySyncReport,
    ) -> Result<PushAction> {
        let local_updated_at = self.entity.updated_at(local);
        let local_deleted = self.entity.is_deleted(local);
        let remote = ctx.remote.get(&self.collection, id).await?;

        if let Some(remote) = remote.as_ref().filter(|doc| doc.is_deleted) {
            if !local_deleted {
                self.record_conflict(
                    ctx,
                    id,
                    local_updated_at,
                    remote.updated_at,
                    ConflictResolution::RemoteTombstone,
                )
                .await;
                self.dao.mark_deleted_by_ids(&[id.to_string()]).await?;
                report.deleted_ids.push(id.to_string());
            }
            return Ok(PushAction::Refused);
        }

        if local_deleted {
            if local_updated_at <= checkpoint {
                return Ok(PushAction::AlreadyPushed);
            }
            ctx.remote
                .set(
                    &self.collection,
                    id,
                    &tombstone_document(ctx.uid, id, local_updated_at),
                )
                .await?;
            return Ok(PushAction::TombstonePushed);
        }

        if let Some(remote) = remote.as_ref().filter(|doc| doc.updated_at > local_updated_at) {
            self.record_conflict(
                ctx,
                id,
                local_updated_at,
                remote.updated_at,
                ConflictResolution::RemoteNewer,
            )
            .await;
            return Ok(PushAction::Refused);
        }

        ctx.remote
            .set(&self.collection, id, &self.entity.to_remote(local, ctx.uid))
            .await?;
        Ok(PushAction::Uploaded)
    }

    async fn pull(&self, ctx: &SyncContext<'_>, report: &mut EntitySyncReport) -> Result<()> {
        let metadata = ctx.db.sync_metadata(&self.entity_key).await?;
        let local_checkpoint = metadata.last_local_sync_at;
        let since = metadata.last_remote_sync_at;
        let documents = ctx.remote.changed_since(&self.collection, ctx.uid, since).await?;

        let mut upserts = Vec::new();
        let mut deletes = Vec::new();
        let mut advanced = since;
        let mut blocked = false;

        for document in documents {
            let incoming = self.entity.from_remote(&document.id, &document.body);

            if document.is_deleted || self.entity.is_deleted(&incoming) {
                deletes.push(document.id.clone());
            } else {
                match self.should_apply(ctx, &document.id, document.updated_at, local_checkpoint).await {
                    Ok(true) => upserts.push(incoming),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(entity = %self.entity_key, record_id = %document.id, error = %e, "Failed to reconcile document");
                        report.failed += 1;
                        blocked = true;
                        continue;
                    }
                }
            }

            if !blocked {
                advanced = advanced.max(document.updated_at);
            }
        }

        report
            .applied_ids
            .extend(upserts.iter().map(|local| self.entity.local_id(local)));
        report.deleted_ids.extend(deletes.iter().cloned());

        if !upserts.is_empty() {
            self.dao.upsert_all(upserts).await?;
        }
        if !deletes.is_empty() {
            self.dao.mark_deleted_by_ids(&deletes).await?;
        }
        if advanced > since {
            ctx.db
                .advance_remote_checkpoint(&self.entity_key, advanced)
                .await?;
        }
        Ok(())
    }

    async fn should_apply(
        &self,
        ctx: &SyncContext<'_>,
        id: &str,
        remote_updated_at: i64,
        local_checkpoint: i64,
    ) -> Result<bool> {
        if self.strategy == ConflictStrategy::RemoteWins {
            return Ok(true);
        }

        let local_updated_at = self.dao.local_updated_at(id).await?;
        let apply = match self.strategy {
            ConflictStrategy::RemoteWins => true,
            ConflictStrategy::LocalWins => {
                local_updated_at.is_none() || remote_updated_at > local_checkpoint
            }
            ConflictStrategy::LatestUpdatedWins => remote_updated_at > local_checkpoint,
        };

        // Our own pushes echo back with identical timestamps; not a conflict
        if let Some(local_updated_at) = local_updated_at.filter(|at| !apply && *at != remote_updated_at) {
            self.record_conflict(
                ctx,
                id,
                local_updated_at,
                remote_updated_at,
                ConflictResolution::LocalKept,
            )
            .await;
        }
        Ok(apply)
    }
}

#[async_trait]
impl<E: SyncEntity> EntitySync for EntitySyncConfig<E> {
    fn entity_key(&self) -> &str {
        &self.entity_key
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn sync(&self, ctx: &SyncContext<'_>) -> Result<EntitySyncReport> {
        let mut report = EntitySyncReport {
            entity_key: self.entity_key.clone(),
            ..EntitySyncReport::default()
        };

        if self.direction.pushes() {
            self.push(ctx, &mut report).await?;
        }
        if self.direction.pulls() {
            self.pull(ctx, &mut report).await?;
        }

        tracing::debug!(
            entity = %self.entity_key,
            uploaded = report.uploaded,
            tombstones = report.tombstones_pushed,
            applied = report.applied_ids.len(),
            deleted = report.deleted_ids.len(),
            conflicts = report.conflicts,
            failed = report.failed,
            "Entity sync pass finished"
        );
        Ok(report)
    }
}
