//! Data models for Nudge

mod fire_state;
mod reminder;
mod repeat;
mod sync_conflict;
mod sync_metadata;

pub use fire_state::FireState;
pub use reminder::{
    normalize_offsets, Reminder, ReminderDraft, ReminderId, AT_TIME_OFFSET, MAX_OFFSET_MILLIS,
};
pub use repeat::RepeatRule;
pub use sync_conflict::{ConflictResolution, SyncConflict};
pub use sync_metadata::SyncMetadata;
