//! Reminder entity mapping for the sync engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{ConflictStrategy, EntitySyncConfig, SyncDao, SyncDirection, SyncEntity};
use crate::models::{normalize_offsets, Reminder, ReminderId, RepeatRule};
use crate::services::DatabaseService;
use crate::util::instant_from_millis;
use crate::Result;

pub const REMINDERS_ENTITY_KEY: &str = "reminders";
pub const REMINDERS_COLLECTION: &str = "reminders";

const UNTITLED: &str = "Untitled reminder";

/// Remote shape of a reminder document
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderDocument {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    event_at: i64,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default)]
    repeat_rule: RepeatRule,
    #[serde(default)]
    reminder_offsets: Vec<i64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_enabled() -> bool {
    true
}

/// Maps [`Reminder`] rows to and from remote documents
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderSyncEntity;

impl ReminderSyncEntity {
    /// Record used when a document cannot be read: disabled, so it never
    /// fires, but keeps the remote timestamps for later reconciliation.
    fn fallback(id: &str, document: &Value) -> Reminder {
        Reminder {
            id: ReminderId::from(id),
            title: UNTITLED.to_string(),
            description: None,
            event_at: instant_from_millis(0),
            timezone: default_timezone(),
            repeat: RepeatRule::None,
            offsets: Vec::new(),
            enabled: false,
            is_deleted: document
                .get("isDeleted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            created_at: 0,
            updated_at: document
                .get("updatedAt")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        }
    }
}

impl SyncEntity for ReminderSyncEntity {
    type Local = Reminder;

    fn to_remote(&self, local: &Reminder, uid: &str) -> Value {
        let document = ReminderDocument {
            uid: uid.to_string(),
            id: local.id.to_string(),
            title: local.title.clone(),
            description: local.description.clone(),
            event_at: local.event_at.timestamp_millis(),
            timezone: local.timezone.clone(),
            repeat_rule: local.repeat,
            reminder_offsets: local.offsets.clone(),
            enabled: local.enabled,
            is_deleted: local.is_deleted,
            created_at: local.created_at,
            updated_at: local.updated_at,
        };
        serde_json::to_value(document).unwrap_or(Value::Null)
    }

    fn from_remote(&self, id: &str, document: &Value) -> Reminder {
        match ReminderDocument::deserialize(document) {
            Ok(document) => {
                let title = document.title.trim();
                Reminder {
                    id: ReminderId::from(id),
                    title: if title.is_empty() {
                        UNTITLED.to_string()
                    } else {
                        title.to_string()
                    },
                    description: document.description,
                    event_at: instant_from_millis(document.event_at),
                    timezone: document.timezone,
                    repeat: document.repeat_rule,
                    offsets: normalize_offsets(document.reminder_offsets),
                    enabled: document.enabled,
                    is_deleted: document.is_deleted,
                    created_at: document.created_at,
                    updated_at: document.updated_at,
                }
            }
            Err(e) => {
                tracing::warn!(record_id = id, error = %e, "Malformed reminder document, using fallback");
                Self::fallback(id, document)
            }
        }
    }

    fn local_id(&self, local: &Reminder) -> String {
        local.id.to_string()
    }

    fn updated_at(&self, local: &Reminder) -> i64 {
        local.updated_at
    }

    fn is_deleted(&self, local: &Reminder) -> bool {
        local.is_deleted
    }
}

/// [`SyncDao`] over the local reminder table
#[derive(Clone)]
pub struct ReminderSyncDao {
    db: DatabaseService,
}

impl ReminderSyncDao {
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncDao<Reminder> for ReminderSyncDao {
    async fn locals_changed_after(&self, checkpoint: i64) -> Result<Vec<Reminder>> {
        self.db.reminders_changed_after(checkpoint).await
    }

    async fn upsert_all(&self, records: Vec<Reminder>) -> Result<()> {
        self.db.save_reminders(&records).await
    }

    async fn mark_deleted_by_ids(&self, ids: &[String]) -> Result<()> {
        let ids: Vec<ReminderId> = ids.iter().map(|id| ReminderId::from(id.as_str())).collect();
        self.db.mark_reminders_deleted(&ids).await
    }

    async fn local_updated_at(&self, id: &str) -> Result<Option<i64>> {
        self.db.reminder_updated_at(&ReminderId::from(id)).await
    }
}

/// Sync config for reminders
pub fn reminder_sync_config(
    db: DatabaseService,
    strategy: ConflictStrategy,
) -> EntitySyncConfig<ReminderSyncEntity> {
    EntitySyncConfig {
        entity_key: REMINDERS_ENTITY_KEY.to_string(),
        collection: REMINDERS_COLLECTION.to_string(),
        strategy,
        direction: SyncDirection::Bidirectional,
        entity: ReminderSyncEntity,
        dao: std::sync::Arc::new(ReminderSyncDao::new(db)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::draft;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn document_carries_sync_fields() {
        let event_at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let reminder =
            Reminder::from_draft(draft("Gym", event_at, RepeatRule::Weekly, vec![0, 900_000]), 77)
                .unwrap();

        let doc = ReminderSyncEntity.to_remote(&reminder, "user-1");

        assert_eq!(doc["uid"], "user-1");
        assert_eq!(doc["id"], reminder.id.as_str());
        assert_eq!(doc["updatedAt"], 77);
        assert_eq!(doc["isDeleted"], false);
        assert_eq!(doc["eventAt"], 1_700_000_000_000_i64);
        assert_eq!(doc["repeatRule"], "weekly");
        assert_eq!(doc["reminderOffsets"], json!([0, 900_000]));
    }

    #[test]
    fn remote_document_maps_back() {
        let event_at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let reminder =
            Reminder::from_draft(draft("Gym", event_at, RepeatRule::Monthly, vec![60_000]), 77)
                .unwrap();
        let doc = ReminderSyncEntity.to_remote(&reminder, "user-1");

        assert_eq!(ReminderSyncEntity.from_remote(reminder.id.as_str(), &doc), reminder);
    }

    #[test]
    fn unknown_repeat_rule_reads_as_one_time() {
        let doc = json!({
            "uid": "u", "id": "r1", "title": "Tea", "eventAt": 1_000,
            "repeatRule": "fortnightly", "updatedAt": 5
        });
        let reminder = ReminderSyncEntity.from_remote("r1", &doc);
        assert_eq!(reminder.repeat, RepeatRule::None);
        assert!(reminder.enabled);
        assert_eq!(reminder.timezone, "UTC");
    }

    #[test]
    fn out_of_range_remote_offsets_are_dropped() {
        let doc = json!({
            "uid": "u", "id": "r1", "title": "Tea", "eventAt": 1_000,
            "reminderOffsets": [109_500_000_000_000_000_i64, 60_000, -1], "updatedAt": 5
        });
        let reminder = ReminderSyncEntity.from_remote("r1", &doc);
        assert_eq!(reminder.offsets, vec![60_000]);
    }

    #[test]
    fn malformed_document_falls_back_to_disabled_record() {
        let doc = json!({"uid": "u", "eventAt": "tomorrow", "updatedAt": 12, "isDeleted": false});
        let reminder = ReminderSyncEntity.from_remote("r9", &doc);

        assert_eq!(reminder.id.as_str(), "r9");
        assert_eq!(reminder.title, UNTITLED);
        assert!(!reminder.enabled);
        assert!(!reminder.is_deleted);
        assert_eq!(reminder.updated_at, 12);

        let from_null = ReminderSyncEntity.from_remote("r10", &Value::Null);
        assert_eq!(from_null.updated_at, 0);
    }

    #[test]
    fn tombstone_document_maps_to_deleted() {
        let doc = json!({"uid": "u", "id": "r1", "isDeleted": true, "updatedAt": 30});
        let reminder = ReminderSyncEntity.from_remote("r1", &doc);
        assert!(reminder.is_deleted);
        assert_eq!(reminder.updated_at, 30);
    }
}
