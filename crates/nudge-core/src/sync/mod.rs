//! Bidirectional sync between the local store and a shared document store.
//!
//! Deletes travel as tombstones and always win; other changes are resolved
//! per entity by a [`ConflictStrategy`] over client `updatedAt` timestamps.

mod engine;
mod entity;
mod reminders;
mod remote;

pub use engine::{SyncEngine, SyncOutcome};
pub use entity::{
    ConflictStrategy, EntitySync, EntitySyncConfig, EntitySyncReport, SyncContext, SyncDao,
    SyncDirection, SyncEntity,
};
pub use reminders::{
    reminder_sync_config, ReminderSyncDao, ReminderSyncEntity, REMINDERS_COLLECTION,
    REMINDERS_ENTITY_KEY,
};
pub use remote::{tombstone_document, DocumentStore, LibSqlDocumentStore, RemoteDocument};
