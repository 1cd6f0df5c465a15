//! Reminder model

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::RepeatRule;
use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Offset used when a reminder has none configured: fire at the moment.
pub const AT_TIME_OFFSET: i64 = 0;

/// Largest accepted offset: one leap year before the event.
pub const MAX_OFFSET_MILLIS: i64 = 366 * 24 * 60 * 60 * 1000;

/// Globally unique reminder identifier.
///
/// Used as both the local primary key and the remote document key, so ids
/// created on other devices are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    /// Create a new unique reminder ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ReminderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ReminderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A reminder and everything needed to schedule it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub description: Option<String>,
    /// Anchor event instant, independent of timezone
    pub event_at: DateTime<Utc>,
    /// IANA zone used for wall-clock repeat math
    pub timezone: String,
    pub repeat: RepeatRule,
    /// Milliseconds before the anchor, ascending and deduplicated
    pub offsets: Vec<i64>,
    pub enabled: bool,
    /// Soft delete tombstone for sync
    pub is_deleted: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation (Unix ms), authority for conflict resolution
    pub updated_at: i64,
}

impl Reminder {
    /// Build a new enabled reminder from validated draft input
    pub fn from_draft(draft: ReminderDraft, now_millis: i64) -> Result<Self> {
        let draft = draft.validate()?;
        Ok(Self {
            id: ReminderId::new(),
            title: draft.title,
            description: draft.description,
            event_at: draft.event_at,
            timezone: draft.timezone,
            repeat: draft.repeat,
            offsets: normalize_offsets(draft.offsets),
            enabled: true,
            is_deleted: false,
            created_at: now_millis,
            updated_at: now_millis,
        })
    }

    /// Offsets to schedule; an empty set means "at the moment".
    #[must_use]
    pub fn effective_offsets(&self) -> Vec<i64> {
        if self.offsets.is_empty() {
            vec![AT_TIME_OFFSET]
        } else {
            self.offsets.clone()
        }
    }

    /// Whether the scheduler should arm alarms for this reminder
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && !self.is_deleted
    }

    /// Record a local mutation
    pub fn touch(&mut self, now_millis: i64) {
        self.updated_at = now_millis;
    }

    /// Apply draft values onto an existing reminder, keeping identity and flags
    pub fn apply_draft(&mut self, draft: ReminderDraft, now_millis: i64) -> Result<()> {
        let draft = draft.validate()?;
        self.title = draft.title;
        self.description = draft.description;
        self.event_at = draft.event_at;
        self.timezone = draft.timezone;
        self.repeat = draft.repeat;
        self.offsets = normalize_offsets(draft.offsets);
        self.touch(now_millis);
        Ok(())
    }
}

/// User-supplied reminder fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub title: String,
    pub description: Option<String>,
    pub event_at: DateTime<Utc>,
    pub timezone: String,
    pub repeat: RepeatRule,
    pub offsets: Vec<i64>,
}

impl ReminderDraft {
    fn validate(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("reminder title cannot be empty".into()));
        }
        let timezone = self.timezone.trim().to_string();
        if timezone.parse::<Tz>().is_err() {
            return Err(Error::InvalidInput(format!(
                "unknown IANA timezone '{timezone}'"
            )));
        }
        if let Some(offset) = self.offsets.iter().find(|offset| **offset < 0) {
            return Err(Error::InvalidInput(format!(
                "reminder offsets must not be negative (got {offset})"
            )));
        }
        if let Some(offset) = self
            .offsets
            .iter()
            .find(|offset| **offset > MAX_OFFSET_MILLIS)
        {
            return Err(Error::InvalidInput(format!(
                "reminder offsets must be at most {MAX_OFFSET_MILLIS} ms (got {offset})"
            )));
        }
        Ok(Self {
            title,
            description: normalize_text_option(self.description),
            timezone,
            ..self
        })
    }
}

/// Sort ascending, drop duplicates and values outside `0..=MAX_OFFSET_MILLIS`.
#[must_use]
pub fn normalize_offsets(mut offsets: Vec<i64>) -> Vec<i64> {
    offsets.retain(|offset| (0..=MAX_OFFSET_MILLIS).contains(offset));
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}
