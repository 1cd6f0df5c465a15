use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;

use super::entity::{EntitySync, EntitySyncReport, SyncContext};
use super::remote::DocumentStore;
use crate::auth::SessionProvider;
use crate::clock::Clock;
use crate::services::DatabaseService;
use crate::{Error, Result};

/// Result of a `sync_all` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No signed-in user; nothing was touched
    NotAuthenticated,
    /// No remote store is configured
    NotConfigured,
    Completed(Vec<EntitySyncReport>),
    /// At least one entity failed; reschedule with backoff
    Retry {
        reports: Vec<EntitySyncReport>,
        error: String,
    },
}

impl SyncOutcome {
    /// Reports of the entities that finished, whatever the overall outcome
    pub fn reports(&self) -> &[EntitySyncReport] {
        match self {
            Self::NotAuthenticated | Self::NotConfigured => &[],
            Self::Completed(reports) | Self::Retry { reports, .. } => reports,
        }
    }

    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Reconciles every registered entity type with the remote store.
pub struct SyncEngine {
    entities: Vec<Box<dyn EntitySync>>,
    remote: Arc<dyn DocumentStore>,
    db: DatabaseService,
    session: Arc<dyn SessionProvider>,
    clock: Arc<dyn Clock>,
    running: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        db: DatabaseService,
        remote: Arc<dyn DocumentStore>,
        session: Arc<dyn SessionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entities: Vec::new(),
            remote,
            db,
            session,
            clock,
            running: Mutex::new(()),
        }
    }

    /// Add an entity type; entities sync in registration order
    #[must_use]
    pub fn register(mut self, entity: impl EntitySync + 'static) -> Self {
        self.entities.push(Box::new(entity));
        self
    }

    /// Push then pull every entity type for the signed-in user.
    ///
    /// Runs are serialized so two passes never race on a checkpoint. A failing
    /// entity does not stop the others.
    pub async fn sync_all(&self) -> SyncOutcome {
        let Some(uid) = self.session.current_user_id() else {
            tracing::debug!("Skipping sync: no signed-in user");
            return SyncOutcome::NotAuthenticated;
        };

        let _guard = self.running.lock().await;
        let ctx = SyncContext {
            uid: &uid,
            remote: self.remote.as_ref(),
            db: &self.db,
            now_millis: self.clock.now_millis(),
        };

        let mut reports = Vec::with_capacity(self.entities.len());
        let mut errors = Vec::new();
        for entity in &self.entities {
            match entity.sync(&ctx).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(entity = entity.entity_key(), error = %e, "Sync pass failed");
                    errors.push(format!("{}: {e}", entity.entity_key()));
                }
            }
        }

        if errors.is_empty() {
            tracing::info!(entities = reports.len(), "Sync complete");
            SyncOutcome::Completed(reports)
        } else {
            SyncOutcome::Retry {
                reports,
                error: errors.join("; "),
            }
        }
    }

    /// Drop remote tombstones older than `max_age` from every collection.
    ///
    /// A device that has not synced within `max_age` will not learn about
    /// those deletes; pick an age longer than any device stays offline.
    pub async fn purge_remote_tombstones(&self, max_age: Duration) -> Result<u64> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(max_age)
            .ok_or_else(|| Error::InvalidInput(format!("tombstone age {max_age} is out of range")))?
            .timestamp_millis();
        let _guard = self.running.lock().await;

        let mut removed = 0;
        for entity in &self.entities {
            let purged = self
                .remote
                .purge_tombstones(entity.collection(), cutoff)
                .await?;
            if purged > 0 {
                tracing::info!(collection = entity.collection(), purged, "Purged remote tombstones");
            }
            removed += purged;
        }
        Ok(removed)
    }
}
