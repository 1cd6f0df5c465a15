//! Recording doubles for the platform seams, shared by unit and flow tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::auth::SessionProvider;
use crate::models::{ReminderDraft, RepeatRule};
use crate::platform::{
    AlarmPayload, AlarmPlatform, AlarmPrecision, Notification, Notifier, PlatformError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedAlarm {
    pub alarm_id: i32,
    pub trigger_at: DateTime<Utc>,
    pub precision: AlarmPrecision,
    pub payload: AlarmPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Set(i32, AlarmPrecision),
    Cancel(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    DenyExact,
    All,
}

/// Alarm platform that keeps armed alarms in memory
#[derive(Debug)]
pub struct RecordingAlarmPlatform {
    exact_permitted: bool,
    failure: Mutex<FailureMode>,
    armed: Mutex<BTreeMap<i32, ArmedAlarm>>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl RecordingAlarmPlatform {
    pub fn new(exact_permitted: bool) -> Self {
        Self {
            exact_permitted,
            failure: Mutex::new(FailureMode::None),
            armed: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Refuse every precision except inexact
    pub fn deny_exact(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = FailureMode::DenyExact;
    }

    /// Refuse every alarm
    pub fn fail_all(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = FailureMode::All;
    }

    pub fn armed(&self) -> Vec<ArmedAlarm> {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn armed_for(&self, reminder_id: &str) -> Vec<ArmedAlarm> {
        self.armed()
            .into_iter()
            .filter(|alarm| alarm.payload.reminder_id.as_str() == reminder_id)
            .collect()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlarmPlatform for RecordingAlarmPlatform {
    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_permitted
    }

    fn set_alarm(
        &self,
        alarm_id: i32,
        trigger_at: DateTime<Utc>,
        precision: AlarmPrecision,
        payload: &AlarmPayload,
    ) -> Result<(), PlatformError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PlatformCall::Set(alarm_id, precision));

        match *self.failure.lock().unwrap_or_else(PoisonError::into_inner) {
            FailureMode::All => return Err(PlatformError::Unavailable("offline".into())),
            FailureMode::DenyExact if precision != AlarmPrecision::Inexact => {
                return Err(PlatformError::PermissionDenied("exact alarms".into()));
            }
            _ => {}
        }

        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                alarm_id,
                ArmedAlarm {
                    alarm_id,
                    trigger_at,
                    precision,
                    payload: payload.clone(),
                },
            );
        Ok(())
    }

    fn cancel_alarm(&self, alarm_id: i32) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PlatformCall::Cancel(alarm_id));
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&alarm_id);
    }
}

/// Notification tray that records what was posted
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
    cancelled: Mutex<Vec<i32>>,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cancelled(&self) -> Vec<i32> {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: &Notification) -> Result<(), PlatformError> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }

    fn cancel(&self, notification_id: i32) {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification_id);
    }
}

/// Session whose user can be switched mid-test
#[derive(Debug, Default)]
pub struct SwitchableSession {
    uid: Mutex<Option<String>>,
}

impl SwitchableSession {
    pub fn signed_in(uid: &str) -> Self {
        Self {
            uid: Mutex::new(Some(uid.to_string())),
        }
    }

    pub fn sign_out(&self) {
        *self.uid.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionProvider for SwitchableSession {
    fn current_user_id(&self) -> Option<String> {
        self.uid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub fn draft(title: &str, event_at: DateTime<Utc>, repeat: RepeatRule, offsets: Vec<i64>) -> ReminderDraft {
    ReminderDraft {
        title: title.to_string(),
        description: None,
        event_at,
        timezone: "UTC".to_string(),
        repeat,
        offsets,
    }
}
