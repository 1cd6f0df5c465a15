//! Flow tests across scheduling, firing, restore and multi-device sync.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;

use crate::app::{HostServices, NudgeApp};
use crate::clock::ManualClock;
use crate::models::{ReminderDraft, ReminderId, RepeatRule};
use crate::notify::FireOutcome;
use crate::platform::{AlarmPlatform, NotificationImportance};
use crate::schedule::slot_id;
use crate::services::DatabaseService;
use crate::sync::{ConflictStrategy, DocumentStore, LibSqlDocumentStore, SyncOutcome, REMINDERS_COLLECTION};
use crate::testing::{RecordingAlarmPlatform, RecordingNotifier, SwitchableSession};

struct Device {
    app: NudgeApp,
    platform: Arc<RecordingAlarmPlatform>,
    notifier: Arc<RecordingNotifier>,
    clock: ManualClock,
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

async fn device(start: DateTime<Utc>, remote: Option<&LibSqlDocumentStore>) -> Device {
    let db = DatabaseService::open_in_memory().await.unwrap();
    let platform = Arc::new(RecordingAlarmPlatform::new(true));
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = ManualClock::new(start);
    let app = NudgeApp::new(
        db,
        HostServices {
            alarms: platform.clone(),
            notifier: notifier.clone(),
            clock: Arc::new(clock.clone()),
            session: Arc::new(SwitchableSession::signed_in("user-1")),
        },
    );
    let app = match remote {
        Some(remote) => app.with_remote(Arc::new(remote.clone()), ConflictStrategy::LatestUpdatedWins),
        None => app,
    };
    Device {
        app,
        platform,
        notifier,
        clock,
    }
}

fn meal(event_at: DateTime<Utc>, title: &str) -> ReminderDraft {
    ReminderDraft {
        title: title.to_string(),
        description: None,
        event_at,
        timezone: "Europe/Berlin".to_string(),
        repeat: RepeatRule::Daily,
        offsets: vec![0],
    }
}

fn synced(outcome: &SyncOutcome) {
    assert!(matches!(outcome, SyncOutcome::Completed(_)), "{outcome:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn yearly_reminder_fires_records_and_rearms() {
    let start = utc("2025-03-10T08:00:00Z");
    let dev = device(start, None).await;
    // An hour out, with a minute of slack so the early alarm is still ahead
    let anchor = start + Duration::hours(1) + Duration::minutes(1);

    let saved = dev
        .app
        .reminders
        .create(ReminderDraft {
            title: "Anniversary".to_string(),
            description: Some("Book a table".to_string()),
            event_at: anchor,
            timezone: "Asia/Kolkata".to_string(),
            repeat: RepeatRule::Yearly,
            offsets: vec![0, 3_600_000],
        })
        .await
        .unwrap();
    let id = saved.reminder.id.clone();

    let mut triggers: Vec<DateTime<Utc>> = dev
        .platform
        .armed_for(id.as_str())
        .iter()
        .map(|alarm| alarm.trigger_at)
        .collect();
    triggers.sort();
    assert_eq!(triggers, vec![anchor - Duration::hours(1), anchor]);

    // Early ping: shown, but leaves no fire-state
    dev.clock.set(anchor - Duration::hours(1));
    let early = dev
        .platform
        .armed_for(id.as_str())
        .into_iter()
        .find(|alarm| alarm.payload.offset_millis == 3_600_000)
        .unwrap();
    dev.app.receiver.on_alarm_fired(&early.payload).await;
    assert!(dev.app.db.fire_states_for(&id).await.unwrap().is_empty());

    // At-time alarm
    dev.clock.set(anchor);
    let at_time = dev
        .platform
        .armed_for(id.as_str())
        .into_iter()
        .find(|alarm| alarm.payload.offset_millis == 0)
        .unwrap();
    let outcome = dev.app.receiver.on_alarm_fired(&at_time.payload).await;
    assert_eq!(
        outcome,
        FireOutcome::Delivered {
            recorded: true,
            rearmed: true,
        }
    );

    let states = dev.app.db.fire_states_for(&id).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].offset_millis, 0);
    assert_eq!(states[0].last_fired_at, Some(anchor));
    assert_eq!(states[0].dismissed_at, None);

    let next_year = utc("2026-03-10T09:01:00Z");
    let mut triggers: Vec<DateTime<Utc>> = dev
        .platform
        .armed_for(id.as_str())
        .iter()
        .map(|alarm| alarm.trigger_at)
        .collect();
    triggers.sort();
    assert_eq!(triggers, vec![next_year - Duration::hours(1), next_year]);

    let shown = dev.notifier.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[1].id, slot_id(&id, 0));
    assert_eq!(shown[1].importance, NotificationImportance::Alert);
    assert_eq!(shown[1].body, "Book a table");
}

#[tokio::test(flavor = "multi_thread")]
async fn restoring_notifications_twice_writes_nothing() {
    let start = utc("2025-06-01T07:00:00Z");
    let dev = device(start, None).await;
    let saved = dev
        .app
        .reminders
        .create(meal(start + Duration::minutes(10), "Breakfast"))
        .await
        .unwrap();
    let id = saved.reminder.id;

    dev.clock.advance(Duration::minutes(10));
    let alarm = dev.platform.armed_for(id.as_str()).remove(0);
    dev.app.receiver.on_alarm_fired(&alarm.payload).await;

    let states_before = dev.app.db.fire_states_for(&id).await.unwrap();
    let reminder_before = dev.app.db.get_reminder(&id).await.unwrap();
    let calls_before = dev.platform.calls().len();

    assert_eq!(dev.app.restore.restore_active_notifications().await, 1);
    assert_eq!(dev.app.restore.restore_active_notifications().await, 1);

    assert_eq!(dev.app.db.fire_states_for(&id).await.unwrap(), states_before);
    assert_eq!(dev.app.db.get_reminder(&id).await.unwrap(), reminder_before);
    assert_eq!(dev.platform.calls().len(), calls_before);

    let restored: Vec<_> = dev
        .notifier
        .shown()
        .into_iter()
        .filter(|n| n.importance == NotificationImportance::Silent)
        .collect();
    assert_eq!(restored.len(), 2);
    assert!(restored.iter().all(|n| n.id == slot_id(&id, 0)));

    // Dismissing ends the restore cycle
    dev.app.receiver.on_dismissed(&id, 0).await.unwrap();
    assert_eq!(dev.app.restore.restore_active_notifications().await, 0);
    assert!(dev.notifier.cancelled().contains(&slot_id(&id, 0)));
}

#[tokio::test(flavor = "multi_thread")]
async fn latest_edit_wins_on_both_devices() {
    // Either device may reach the server first
    for a_first in [true, false] {
        let remote = LibSqlDocumentStore::open_in_memory().await.unwrap();
        let start = utc("2025-01-01T12:00:00Z");
        let a = device(start, Some(&remote)).await;
        let b = device(start, Some(&remote)).await;

        let saved = a
            .app
            .reminders
            .create(meal(start + Duration::hours(1), "Meal"))
            .await
            .unwrap();
        let id = saved.reminder.id;
        synced(&a.app.sync().await);
        synced(&b.app.sync().await);
        assert_eq!(b.app.reminders.get(&id).await.unwrap().title, "Meal");
        assert_eq!(b.platform.armed_for(id.as_str()).len(), 1);

        // Offline edits
        a.clock.set(start + Duration::milliseconds(100));
        a.app
            .reminders
            .update(&id, meal(start + Duration::hours(1), "Lunch"))
            .await
            .unwrap();
        b.clock.set(start + Duration::milliseconds(200));
        b.app
            .reminders
            .update(&id, meal(start + Duration::hours(1), "Dinner"))
            .await
            .unwrap();

        let (first, second) = if a_first { (&a, &b) } else { (&b, &a) };
        synced(&first.app.sync().await);
        synced(&second.app.sync().await);
        synced(&first.app.sync().await);

        for dev in [&a, &b] {
            let stored = dev.app.reminders.get(&id).await.unwrap();
            assert_eq!(stored.title, "Dinner", "a_first={a_first}");
            assert_eq!(stored.updated_at, (start + Duration::milliseconds(200)).timestamp_millis());
            let armed = dev.platform.armed_for(id.as_str());
            assert_eq!(armed.len(), 1);
            assert_eq!(armed[0].payload.title, "Dinner");
        }
        let doc = remote.get(REMINDERS_COLLECTION, id.as_str()).await.unwrap().unwrap();
        assert_eq!(doc.body["title"], "Dinner");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_beats_a_later_edit_elsewhere() {
    let remote = LibSqlDocumentStore::open_in_memory().await.unwrap();
    let start = utc("2025-01-01T12:00:00Z");
    let a = device(start, Some(&remote)).await;
    let b = device(start, Some(&remote)).await;

    let saved = a
        .app
        .reminders
        .create(meal(start + Duration::hours(2), "Team lunch"))
        .await
        .unwrap();
    let id: ReminderId = saved.reminder.id;
    synced(&a.app.sync().await);
    synced(&b.app.sync().await);

    a.clock.advance(Duration::seconds(1));
    a.app.reminders.delete(&id).await.unwrap();
    // B edits later by its own clock, without having seen the delete
    b.clock.advance(Duration::minutes(5));
    b.app
        .reminders
        .update(&id, meal(start + Duration::hours(3), "Team lunch (moved)"))
        .await
        .unwrap();

    synced(&a.app.sync().await);
    synced(&b.app.sync().await);

    let doc = remote.get(REMINDERS_COLLECTION, id.as_str()).await.unwrap().unwrap();
    assert!(doc.is_deleted);
    assert!(b.app.db.get_reminder(&id).await.unwrap().unwrap().is_deleted);
    assert!(b.platform.armed_for(id.as_str()).is_empty());
    assert!(a.platform.armed_for(id.as_str()).is_empty());

    // Stays deleted on later passes
    synced(&b.app.sync().await);
    synced(&a.app.sync().await);
    assert!(remote
        .get(REMINDERS_COLLECTION, id.as_str())
        .await
        .unwrap()
        .unwrap()
        .is_deleted);
}

#[tokio::test(flavor = "multi_thread")]
async fn reboot_restores_alarms_from_the_store() {
    let start = utc("2025-05-05T05:00:00Z");
    let dev = device(start, None).await;
    let kept = dev
        .app
        .reminders
        .create(meal(start + Duration::hours(1), "Daily standup"))
        .await
        .unwrap();
    let one_time = dev
        .app
        .reminders
        .create(ReminderDraft {
            repeat: RepeatRule::None,
            ..meal(start + Duration::hours(2), "Dentist")
        })
        .await
        .unwrap();

    // Reboot wipes platform alarms; the dentist appointment passes meanwhile
    for alarm in dev.platform.armed() {
        dev.platform.cancel_alarm(alarm.alarm_id);
    }
    dev.clock.advance(Duration::hours(3));

    let summary = dev.app.reminders.restore_after_boot().await.unwrap();

    assert_eq!(summary.rescheduled, 1);
    assert_eq!(summary.disabled, 1);
    let armed = dev.platform.armed_for(kept.reminder.id.as_str());
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].trigger_at, start + Duration::hours(1) + Duration::days(1));
    assert!(!dev
        .app
        .reminders
        .get(&one_time.reminder.id)
        .await
        .unwrap()
        .enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn cold_start_reposts_a_fired_one_time_reminder() {
    let start = utc("2025-03-10T08:00:00Z");
    let dev = device(start, None).await;
    let saved = dev
        .app
        .reminders
        .create(ReminderDraft {
            repeat: RepeatRule::None,
            ..meal(start + Duration::minutes(15), "Take pills")
        })
        .await
        .unwrap();
    let id = saved.reminder.id;

    dev.clock.advance(Duration::minutes(15));
    let alarm = dev.platform.armed_for(id.as_str()).remove(0);
    dev.app.receiver.on_alarm_fired(&alarm.payload).await;

    // Process restarts an hour later with the notification still undismissed
    dev.clock.advance(Duration::hours(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let restarted = NudgeApp::new(
        dev.app.db.clone(),
        HostServices {
            alarms: Arc::new(RecordingAlarmPlatform::new(true)),
            notifier: notifier.clone(),
            clock: Arc::new(dev.clock.clone()),
            session: Arc::new(SwitchableSession::signed_in("user-1")),
        },
    );

    let summary = restarted.cold_start().await.unwrap();

    assert_eq!(summary.reposted, 1);
    assert_eq!(summary.alarms.disabled, 1);
    let shown = notifier.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].id, slot_id(&id, 0));
    assert_eq!(shown[0].importance, NotificationImportance::Silent);
    assert!(!restarted.reminders.get(&id).await.unwrap().enabled);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_without_a_remote_reports_not_configured() {
    let dev = device(utc("2025-03-10T08:00:00Z"), None).await;
    assert_eq!(dev.app.sync().await, SyncOutcome::NotConfigured);
}
