use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use nudge_core::auth::StaticSession;
use nudge_core::clock::SystemClock;
use nudge_core::config::{NudgeConfig, RemoteTarget};
use nudge_core::models::{SyncConflict, MAX_OFFSET_MILLIS};
use nudge_core::platform::{AlarmPlatform, Notifier};
use nudge_core::schedule::next_occurrence;
use nudge_core::services::DatabaseService;
use nudge_core::sync::{DocumentStore, LibSqlDocumentStore};
use nudge_core::util::describe_offset;
use nudge_core::{HostServices, NudgeApp, Reminder};
use serde::Serialize;

use crate::error::CliError;
use crate::host::{ConsoleNotifier, DetachedAlarms};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Longest accepted `--older-than` window
const MAX_TOMBSTONE_AGE: std::time::Duration = std::time::Duration::from_secs(100 * 366 * 86_400);

/// Resolved global options shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: NudgeConfig,
    pub db_path: PathBuf,
}

impl CliContext {
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self, CliError> {
        let db_path = match db_path {
            Some(path) => path,
            None => NudgeConfig::default_db_path().ok_or(CliError::NoDataDir)?,
        };
        Ok(Self {
            config: load_config(config_path),
            db_path,
        })
    }
}

/// Load the config file and `NUDGE_*` overrides, falling back to defaults.
pub fn load_config(explicit_path: Option<&Path>) -> NudgeConfig {
    let path = explicit_path
        .map(Path::to_path_buf)
        .or_else(NudgeConfig::default_path);

    let from_file = match path {
        Some(path) => NudgeConfig::load_from_path(&path).unwrap_or_else(|error| {
            tracing::warn!(path = %path.display(), "Ignoring invalid config file: {error}");
            NudgeConfig::default()
        }),
        None => NudgeConfig::default(),
    };

    from_file
        .clone()
        .apply_env(|key| std::env::var(key).ok())
        .unwrap_or_else(|error| {
            tracing::warn!("Ignoring invalid NUDGE_* environment overrides: {error}");
            from_file
        })
}

pub fn host_services(config: &NudgeConfig, alarms: Arc<dyn AlarmPlatform>) -> HostServices {
    host_services_with(config, alarms, Arc::new(ConsoleNotifier::default()))
}

pub fn host_services_with(
    config: &NudgeConfig,
    alarms: Arc<dyn AlarmPlatform>,
    notifier: Arc<dyn Notifier>,
) -> HostServices {
    let access_token = config
        .remote
        .as_ref()
        .and_then(|remote| remote.auth_token.clone());
    HostServices {
        alarms,
        notifier,
        clock: Arc::new(SystemClock),
        session: Arc::new(StaticSession::new(config.user_id.clone(), access_token)),
    }
}

/// Open the app for a one-shot command; alarms are left to the daemon.
pub async fn open_app(context: &CliContext) -> Result<NudgeApp, CliError> {
    let alarms = Arc::new(DetachedAlarms {
        exact_permitted: context.config.exact_alarms_permitted,
    });
    open_app_with(context, host_services(&context.config, alarms)).await
}

pub async fn open_app_with(context: &CliContext, host: HostServices) -> Result<NudgeApp, CliError> {
    let db = DatabaseService::open_path(&context.db_path).await?;
    let app = NudgeApp::new(db, host);
    match open_remote(&context.config).await? {
        Some(remote) => Ok(app.with_remote(remote, context.config.conflict_strategy)),
        None => Ok(app),
    }
}

pub async fn open_remote(config: &NudgeConfig) -> Result<Option<Arc<dyn DocumentStore>>, CliError> {
    let Some(remote) = &config.remote else {
        return Ok(None);
    };
    let store = match remote.target()? {
        RemoteTarget::Server { url, auth_token } => {
            LibSqlDocumentStore::open_remote(url, auth_token).await?
        }
        RemoteTarget::File(path) => LibSqlDocumentStore::open_local(path).await?,
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    Ok(Some(store))
}

pub fn parse_timezone(value: &str) -> Result<Tz, CliError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| CliError::UnknownTimezone(value.trim().to_string()))
}

/// Parse RFC 3339, or `YYYY-MM-DD HH:MM` as wall-clock time in `zone`.
pub fn parse_event_time(input: &str, zone: Tz) -> Result<DateTime<Utc>, CliError> {
    let input = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(input, LOCAL_TIME_FORMAT)
        .map_err(|_| CliError::InvalidTime(input.to_string()))?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CliError::NonexistentLocalTime(input.to_string(), zone.name().to_string()))
}

/// Parse a human duration such as `15m` or `1day` into milliseconds.
pub fn parse_offset(input: &str) -> Result<i64, CliError> {
    if input.trim() == "0" {
        return Ok(0);
    }
    let duration = humantime::parse_duration(input.trim())
        .map_err(|error| CliError::InvalidDuration(input.to_string(), error.to_string()))?;
    i64::try_from(duration.as_millis())
        .ok()
        .filter(|millis| *millis <= MAX_OFFSET_MILLIS)
        .ok_or_else(|| {
            CliError::InvalidDuration(
                input.to_string(),
                format!("must be at most {}", describe_offset(MAX_OFFSET_MILLIS)),
            )
        })
}

pub fn parse_offsets(inputs: &[String]) -> Result<Vec<i64>, CliError> {
    inputs.iter().map(|input| parse_offset(input)).collect()
}

pub fn parse_max_age(input: &str) -> Result<chrono::Duration, CliError> {
    let duration = humantime::parse_duration(input.trim())
        .map_err(|error| CliError::InvalidDuration(input.to_string(), error.to_string()))?;
    if duration > MAX_TOMBSTONE_AGE {
        return Err(CliError::InvalidDuration(
            input.to_string(),
            format!(
                "must be at most {}",
                humantime::format_duration(MAX_TOMBSTONE_AGE)
            ),
        ));
    }
    chrono::Duration::from_std(duration)
        .map_err(|_| CliError::InvalidDuration(input.to_string(), "too large".to_string()))
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ").trim().to_string();
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title)
    }
}

#[derive(Debug, Serialize)]
pub struct ReminderListItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_at: String,
    pub timezone: String,
    pub repeat: String,
    pub offsets: Vec<String>,
    pub enabled: bool,
    pub next_occurrence: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub entity_key: String,
    pub record_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub resolution: String,
}

/// Next time the reminder's at-time alarm fires, if it will fire again
pub fn upcoming(reminder: &Reminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !reminder.is_active() {
        return None;
    }
    if reminder.repeat.is_repeating() {
        next_occurrence(reminder.event_at, &reminder.timezone, reminder.repeat, now)
    } else {
        (reminder.event_at > now).then_some(reminder.event_at)
    }
}

pub fn reminder_to_list_item(reminder: &Reminder, now: DateTime<Utc>) -> ReminderListItem {
    ReminderListItem {
        id: reminder.id.to_string(),
        title: reminder.title.clone(),
        description: reminder.description.clone(),
        event_at: reminder.event_at.to_rfc3339(),
        timezone: reminder.timezone.clone(),
        repeat: reminder.repeat.to_string(),
        offsets: reminder
            .effective_offsets()
            .into_iter()
            .map(describe_offset)
            .collect(),
        enabled: reminder.enabled,
        next_occurrence: upcoming(reminder, now).map(|at| at.to_rfc3339()),
        updated_at: reminder.updated_at,
    }
}

pub fn format_reminder_lines(reminders: &[Reminder], now: DateTime<Utc>) -> Vec<String> {
    reminders
        .iter()
        .map(|reminder| {
            let short_id = reminder.id.as_str().chars().take(13).collect::<String>();
            let title = truncate(&reminder.title, 32);
            let when = upcoming(reminder, now).map_or_else(
                || if reminder.enabled { "elapsed".to_string() } else { "disabled".to_string() },
                |at| format_local_time(at, &reminder.timezone),
            );
            format!("{short_id:<13}  {title:<32}  {when:<22}  {}", reminder.repeat)
        })
        .collect()
}

/// `at` rendered as wall-clock time in `zone` (UTC when the zone is unknown)
pub fn format_local_time(at: DateTime<Utc>, zone: &str) -> String {
    zone.parse::<Tz>().map_or_else(
        |_| at.format("%Y-%m-%d %H:%M UTC").to_string(),
        |tz| at.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z").to_string(),
    )
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated = text
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        entity_key: conflict.entity_key.clone(),
        record_id: conflict.record_id.clone(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        resolution: conflict.resolution.to_string(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<16}  {}={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.resolution,
                conflict.entity_key,
                conflict.record_id,
                conflict.local_updated_at,
                conflict.remote_updated_at
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
