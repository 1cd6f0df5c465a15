//! Platform seams for a terminal host.
//!
//! Alarms are in-process tokio timers, so they only live as long as the
//! daemon; `nudge run` re-arms everything from the store on start.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use nudge_core::platform::{
    AlarmPayload, AlarmPrecision, AlarmPlatform, Notification, NotificationImportance, Notifier,
    PlatformError,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct ArmedTimer {
    token: u64,
    generation: u64,
    task: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<i32, ArmedTimer>>>;

/// Alarm platform backed by tokio timers.
///
/// Due alarms are delivered as payloads on the channel returned by
/// [`TimerAlarms::new`]. Without the exact-alarm permission only
/// [`AlarmPrecision::Inexact`] requests are accepted.
pub struct TimerAlarms {
    exact_permitted: bool,
    fired: mpsc::UnboundedSender<AlarmPayload>,
    timers: TimerMap,
    next_token: AtomicU64,
    generation: AtomicU64,
    runtime: Handle,
}

impl TimerAlarms {
    /// Must be called from within a tokio runtime
    pub fn new(exact_permitted: bool) -> (Self, mpsc::UnboundedReceiver<AlarmPayload>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let alarms = Self {
            exact_permitted,
            fired,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            runtime: Handle::current(),
        };
        (alarms, receiver)
    }

    /// Start a full re-arm pass; pair with [`Self::finish_refresh`].
    pub fn begin_refresh(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cancel every timer not re-armed since `generation` began.
    pub fn finish_refresh(&self, generation: u64) -> usize {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = timers
            .iter()
            .filter(|(_, timer)| timer.generation < generation)
            .map(|(alarm_id, _)| *alarm_id)
            .collect::<Vec<_>>();
        for alarm_id in &stale {
            if let Some(timer) = timers.remove(alarm_id) {
                timer.task.abort();
            }
        }
        stale.len()
    }

    pub fn armed_count(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl AlarmPlatform for TimerAlarms {
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
        if !self.exact_permitted && precision != AlarmPrecision::Inexact {
            return Err(PlatformError::PermissionDenied(
                "exact alarms are not permitted".into(),
            ));
        }
        if self.fired.is_closed() {
            return Err(PlatformError::Unavailable("alarm receiver stopped".into()));
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let delay = (trigger_at - Utc::now()).to_std().unwrap_or_default();
        let fired = self.fired.clone();
        let timer_map = Arc::clone(&self.timers);
        let payload = payload.clone();

        // Held across spawn so an immediately due timer cannot miss its own entry.
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = timer_map.lock().unwrap_or_else(PoisonError::into_inner);
                if timers.get(&alarm_id).is_some_and(|timer| timer.token == token) {
                    timers.remove(&alarm_id);
                }
            }
            if fired.send(payload).is_err() {
                tracing::warn!(alarm_id, "Alarm fired after the receiver stopped");
            }
        });
        let armed = ArmedTimer {
            token,
            generation: self.generation.load(Ordering::SeqCst),
            task,
        };
        if let Some(previous) = timers.insert(alarm_id, armed) {
            previous.task.abort();
        }
        Ok(())
    }

    fn cancel_alarm(&self, alarm_id: i32) {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&alarm_id);
        if let Some(timer) = removed {
            timer.task.abort();
        }
    }
}

/// Alarm platform for one-shot commands.
///
/// The process exits right after the command, so nothing is armed here; the
/// running daemon picks changes up on its next refresh.
#[derive(Debug, Clone, Copy)]
pub struct DetachedAlarms {
    pub exact_permitted: bool,
}

impl AlarmPlatform for DetachedAlarms {
    fn can_schedule_exact_alarms(&self) -> bool {
        self.exact_permitted
    }

    fn set_alarm(
        &self,
        alarm_id: i32,
        trigger_at: DateTime<Utc>,
        precision: AlarmPrecision,
        _payload: &AlarmPayload,
    ) -> Result<(), PlatformError> {
        tracing::debug!(alarm_id, %trigger_at, ?precision, "Alarm deferred to the daemon");
        Ok(())
    }

    fn cancel_alarm(&self, alarm_id: i32) {
        tracing::debug!(alarm_id, "Alarm cancel deferred to the daemon");
    }
}

/// Prints notifications to stdout.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    posted: Mutex<HashSet<i32>>,
}

impl ConsoleNotifier {
    pub fn render(notification: &Notification) -> String {
        let marker = match notification.importance {
            NotificationImportance::Alert => "!",
            NotificationImportance::Silent => "~",
        };
        format!("[{marker}] {}: {}", notification.title, notification.body)
    }
}

impl Notifier for ConsoleNotifier {
    fn show(&self, notification: &Notification) -> Result<(), PlatformError> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(notification.id);
        println!("{}", Self::render(notification));
        Ok(())
    }

    fn cancel(&self, notification_id: i32) {
        let was_posted = self
            .posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&notification_id);
        tracing::debug!(notification_id, was_posted, "Notification cleared");
    }
}
