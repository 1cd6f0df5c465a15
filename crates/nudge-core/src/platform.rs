//! Seams to the operating system: alarms and the notification tray.
//!
//! Hosts implement these traits; the core never talks to the platform any
//! other way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ReminderId, RepeatRule};

/// Errors reported by platform alarm and notification APIs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The call requires a permission the app does not hold
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Any other platform failure
    #[error("Platform error: {0}")]
    Unavailable(String),
}

/// Delivery guarantee requested from the platform alarm service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPrecision {
    /// Exact, and wakes the device from idle
    ExactAllowWhileIdle,
    /// Exact while the device is awake
    Exact,
    /// Batched by the OS
    Inexact,
}

/// Everything the alarm trigger callback needs, without reading the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub reminder_id: ReminderId,
    pub offset_millis: i64,
    /// Occurrence this alarm belongs to
    pub event_at: DateTime<Utc>,
    pub title: String,
    pub message: Option<String>,
    pub repeat: RepeatRule,
}

/// Platform alarm service (e.g. an OS alarm manager or in-process timers)
pub trait AlarmPlatform: Send + Sync {
    /// Whether the app currently holds the exact-alarm permission
    fn can_schedule_exact_alarms(&self) -> bool;

    /// Arm `alarm_id`, replacing any alarm already in that slot
    fn set_alarm(
        &self,
        alarm_id: i32,
        trigger_at: DateTime<Utc>,
        precision: AlarmPrecision,
        payload: &AlarmPayload,
    ) -> Result<(), PlatformError>;

    /// Disarm `alarm_id`; unknown ids are ignored
    fn cancel_alarm(&self, alarm_id: i32);
}

/// How loudly a notification is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationImportance {
    /// New alert with sound/vibration
    Alert,
    /// Quiet re-display, e.g. after a restart
    Silent,
}

/// A notification as handed to the tray
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i32,
    pub reminder_id: ReminderId,
    pub offset_millis: i64,
    pub title: String,
    pub body: String,
    pub importance: NotificationImportance,
}

/// Notification tray
pub trait Notifier: Send + Sync {
    /// Post or replace the notification with `notification.id`
    fn show(&self, notification: &Notification) -> Result<(), PlatformError>;

    /// Remove a posted notification; unknown ids are ignored
    fn cancel(&self, notification_id: i32);
}
