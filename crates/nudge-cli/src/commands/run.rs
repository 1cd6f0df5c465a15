//! `nudge run`: the long-lived reminder daemon.
//!
//! On start fired notifications are re-posted and every enabled reminder is
//! re-armed from the store. Alarms then fire from in-process timers. A short
//! poll re-arms when another `nudge` command writes to the store, and a slower
//! periodic job syncs.

use std::sync::Arc;
use std::time::Duration;

use nudge_core::notify::FireOutcome;
use nudge_core::state::SyncState;
use nudge_core::sync::SyncOutcome;
use nudge_core::services::DatabaseService;
use nudge_core::NudgeApp;
use tokio::time::{Instant, MissedTickBehavior};

use crate::commands::common::{host_services, open_app_with, CliContext};
use crate::error::CliError;
use crate::host::TimerAlarms;

const MAX_BACKOFF_FACTOR: u32 = 8;
const STORE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Periodic sync delay: the configured interval, doubled after each failed
/// run up to `MAX_BACKOFF_FACTOR` times the interval.
#[derive(Debug, Clone)]
pub struct SyncBackoff {
    interval: Duration,
    factor: u32,
}

impl SyncBackoff {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            factor: 1,
        }
    }

    pub fn next_delay(&mut self, outcome: &SyncOutcome) -> Duration {
        self.factor = if outcome.should_retry() {
            (self.factor * 2).min(MAX_BACKOFF_FACTOR)
        } else {
            1
        };
        self.interval * self.factor
    }
}

/// Notices commits made to the store by other processes.
pub struct StoreWatch {
    db: DatabaseService,
    last_seen: Option<i64>,
}

impl StoreWatch {
    pub async fn new(db: DatabaseService) -> Self {
        let last_seen = db.external_change_marker().await.ok();
        Self { db, last_seen }
    }

    /// Whether the store changed since the previous call (or construction)
    pub async fn changed(&mut self) -> bool {
        match self.db.external_change_marker().await {
            Ok(marker) => {
                let changed = self.last_seen != Some(marker);
                self.last_seen = Some(marker);
                changed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll the store for changes");
                false
            }
        }
    }
}

pub async fn run_daemon(context: &CliContext) -> Result<(), CliError> {
    let (alarms, mut fired) = TimerAlarms::new(context.config.exact_alarms_permitted);
    let alarms = Arc::new(alarms);
    let app = open_app_with(context, host_services(&context.config, alarms.clone())).await?;

    let restored = app.cold_start().await?;
    tracing::info!(
        reposted = restored.reposted,
        rescheduled = restored.alarms.rescheduled,
        disabled = restored.alarms.disabled,
        unscheduled = restored.alarms.unscheduled,
        "Restored notifications and alarms"
    );
    println!(
        "nudge is running with {} alarm(s) armed; press Ctrl-C to stop",
        alarms.armed_count()
    );

    let mut backoff = SyncBackoff::new(context.config.sync_interval());
    let mut sync_state = SyncState::Offline;
    let periodic = tokio::time::sleep(context.config.sync_interval());
    tokio::pin!(periodic);
    let mut store_watch = StoreWatch::new(app.db.clone()).await;
    let mut store_poll = tokio::time::interval(STORE_POLL_INTERVAL);
    store_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(payload) = fired.recv() => {
                match app.receiver.on_alarm_fired(&payload).await {
                    FireOutcome::Delivered { recorded, rearmed } => {
                        tracing::debug!(reminder_id = %payload.reminder_id, recorded, ?rearmed, "Alarm delivered");
                    }
                    FireOutcome::Stale => {
                        tracing::debug!(reminder_id = %payload.reminder_id, "Dropped stale alarm");
                    }
                }
            }
            () = &mut periodic => {
                let outcome = periodic_job(&app, &alarms).await;
                let next_state = SyncState::from(&outcome);
                if next_state != sync_state {
                    tracing::info!(state = ?next_state, "Sync state changed");
                    sync_state = next_state;
                }
                let delay = backoff.next_delay(&outcome);
                tracing::debug!(delay = ?delay, "Next periodic run scheduled");
                periodic.as_mut().reset(Instant::now() + delay);
            }
            _ = store_poll.tick() => {
                if store_watch.changed().await {
                    tracing::debug!("Store changed by another process");
                    refresh_alarms(&app, &alarms).await;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Sync, then re-arm from the store.
async fn periodic_job(app: &NudgeApp, alarms: &TimerAlarms) -> SyncOutcome {
    let outcome = app.sync().await;
    if let SyncOutcome::Retry { error, .. } = &outcome {
        tracing::warn!(%error, "Periodic sync failed");
    }
    refresh_alarms(app, alarms).await;
    outcome
}

/// Re-arm every enabled reminder and drop timers for the rest.
///
/// On failure the previously armed set is kept.
pub async fn refresh_alarms(app: &NudgeApp, alarms: &TimerAlarms) {
    let generation = alarms.begin_refresh();
    match app.reminders.restore_after_boot().await {
        Ok(summary) => {
            let cancelled = alarms.finish_refresh(generation);
            tracing::debug!(
                rescheduled = summary.rescheduled,
                disabled = summary.disabled,
                cancelled,
                "Refreshed alarms"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Failed to refresh alarms; keeping the armed set"),
    }
}
