//! Wiring of the core services, built once at startup.

use std::sync::Arc;

use crate::auth::SessionProvider;
use crate::clock::Clock;
use crate::notify::{AlarmReceiver, NotificationRestoreManager};
use crate::platform::{AlarmPlatform, Notifier};
use crate::schedule::{AlarmScheduler, BootRestoreSummary, SchedulingEngine};
use crate::services::{DatabaseService, ReminderService};
use crate::sync::{reminder_sync_config, ConflictStrategy, DocumentStore, SyncEngine, SyncOutcome};
use crate::Result;

/// Host-provided implementations of the platform seams
#[derive(Clone)]
pub struct HostServices {
    pub alarms: Arc<dyn AlarmPlatform>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub session: Arc<dyn SessionProvider>,
}

/// What a cold start restored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColdStartSummary {
    pub reposted: usize,
    pub alarms: BootRestoreSummary,
}

/// Every core service, sharing one database and one set of host seams
pub struct NudgeApp {
    pub db: DatabaseService,
    pub engine: SchedulingEngine,
    pub reminders: ReminderService,
    pub receiver: AlarmReceiver,
    pub restore: NotificationRestoreManager,
    host: HostServices,
    sync: Option<SyncEngine>,
}

impl NudgeApp {
    pub fn new(db: DatabaseService, host: HostServices) -> Self {
        let scheduler = AlarmScheduler::new(host.alarms.clone(), host.clock.clone());
        let engine = SchedulingEngine::new(db.clone(), scheduler, host.clock.clone());
        Self {
            reminders: ReminderService::new(db.clone(), engine.clone(), host.clock.clone()),
            receiver: AlarmReceiver::new(
                db.clone(),
                engine.clone(),
                host.notifier.clone(),
                host.clock.clone(),
            ),
            restore: NotificationRestoreManager::new(
                db.clone(),
                host.notifier.clone(),
                host.session.clone(),
            ),
            engine,
            db,
            host,
            sync: None,
        }
    }

    /// Enable sync of reminders against `remote`
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn DocumentStore>, strategy: ConflictStrategy) -> Self {
        self.sync = Some(
            SyncEngine::new(
                self.db.clone(),
                remote,
                self.host.session.clone(),
                self.host.clock.clone(),
            )
            .register(reminder_sync_config(self.db.clone(), strategy)),
        );
        self
    }

    pub const fn sync_engine(&self) -> Option<&SyncEngine> {
        self.sync.as_ref()
    }

    /// Re-post undismissed notifications, then re-arm alarms from the store.
    ///
    /// Notifications go first: boot restore disables one-time reminders whose
    /// time has passed, and the restore manager skips disabled reminders.
    pub async fn cold_start(&self) -> Result<ColdStartSummary> {
        let reposted = self.restore.restore_active_notifications().await;
        let alarms = self.reminders.restore_after_boot().await?;
        Ok(ColdStartSummary { reposted, alarms })
    }

    /// Sync and re-arm changed reminders; without a remote this is a no-op
    pub async fn sync(&self) -> SyncOutcome {
        match &self.sync {
            Some(engine) => self.reminders.sync(engine).await,
            None => {
                tracing::debug!("Sync requested without a remote store");
                SyncOutcome::NotConfigured
            }
        }
    }
}
