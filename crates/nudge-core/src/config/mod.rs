//! Client configuration.
//!
//! `NudgeConfig` is read from a JSON file (by default
//! `<config dir>/nudge/config.json`) and then overridden by environment
//! variables. Secrets may live in the file but are never logged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::ConflictStrategy;
use crate::util::normalize_text_option;

pub const ENV_USER_ID: &str = "NUDGE_USER_ID";
pub const ENV_REMOTE_URL: &str = "NUDGE_REMOTE_URL";
pub const ENV_REMOTE_TOKEN: &str = "NUDGE_REMOTE_TOKEN";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 900;
const DEFAULT_TOMBSTONE_MAX_AGE_DAYS: u64 = 30;
const MAX_TOMBSTONE_AGE_DAYS: u64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Owner id stamped on synced documents; sync is off without it
    #[serde(default)]
    pub user_id: Option<String>,
    /// Zone for new reminders when none is given
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Whether the host may use exact, idle-waking alarms
    #[serde(default = "default_true")]
    pub exact_alarms_permitted: bool,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    /// Remote tombstones older than this are purged by `sync purge`
    #[serde(default = "default_tombstone_max_age_days")]
    pub tombstone_max_age_days: u64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            default_timezone: default_timezone(),
            exact_alarms_permitted: true,
            remote: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            conflict_strategy: ConflictStrategy::default(),
            tombstone_max_age_days: DEFAULT_TOMBSTONE_MAX_AGE_DAYS,
        }
    }
}

/// Where synced documents live
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// `libsql://`, `https://`, `http://` or `file:` URL
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Resolved remote store location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Server { url: String, auth_token: String },
    File(PathBuf),
}

impl RemoteConfig {
    pub fn target(&self) -> Result<RemoteTarget> {
        let url = self.url.trim();
        if let Some(path) = url.strip_prefix("file:") {
            let path = path.trim_start_matches("//");
            if path.is_empty() {
                return Err(Error::InvalidInput("remote file URL has no path".into()));
            }
            return Ok(RemoteTarget::File(PathBuf::from(path)));
        }

        if ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Ok(RemoteTarget::Server {
                url: url.trim_end_matches('/').to_string(),
                auth_token: normalize_text_option(self.auth_token.clone()).unwrap_or_default(),
            });
        }

        Err(Error::InvalidInput(format!(
            "remote url '{url}' must start with libsql://, https://, http:// or file:"
        )))
    }
}

impl NudgeConfig {
    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nudge").join("config.json"))
    }

    /// Default local database location
    pub fn default_db_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("nudge").join("nudge.db"))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&raw)?;
        config.validated()
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Apply `NUDGE_*` overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(user_id) = normalize_text_option(lookup(ENV_USER_ID)) {
            self.user_id = Some(user_id);
        }
        if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            let auth_token = self.remote.take().and_then(|remote| remote.auth_token);
            self.remote = Some(RemoteConfig { url, auth_token });
        }
        if let Some(token) = normalize_text_option(lookup(ENV_REMOTE_TOKEN)) {
            if let Some(remote) = self.remote.as_mut() {
                remote.auth_token = Some(token);
            }
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.user_id = normalize_text_option(self.user_id);
        self.default_timezone = self.default_timezone.trim().to_string();
        if self.default_timezone.parse::<Tz>().is_err() {
            return Err(Error::InvalidInput(format!(
                "default_timezone '{}' is not an IANA zone",
                self.default_timezone
            )));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "sync_interval_secs must be greater than zero".into(),
            ));
        }
        if let Some(remote) = &self.remote {
            remote.target()?;
        }
        Ok(self)
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn tombstone_max_age(&self) -> chrono::Duration {
        let days = self.tombstone_max_age_days.min(MAX_TOMBSTONE_AGE_DAYS);
        chrono::Duration::days(i64::try_from(days).unwrap_or(0))
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_tombstone_max_age_days() -> u64 {
    DEFAULT_TOMBSTONE_MAX_AGE_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = NudgeConfig::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, NudgeConfig::default());
        assert_eq!(config.sync_interval(), Duration::from_secs(900));
    }

    #[test]
    fn rejects_unknown_fields() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"user_id": "u1", "surprise": true}"#).unwrap();

        let err = NudgeConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = NudgeConfig {
            user_id: Some("u1".into()),
            default_timezone: "Asia/Kolkata".into(),
            remote: Some(RemoteConfig {
                url: "file:/tmp/nudge-remote.db".into(),
                auth_token: None,
            }),
            conflict_strategy: ConflictStrategy::RemoteWins,
            ..NudgeConfig::default()
        };

        config.save_to_path(&path).unwrap();
        assert_eq!(NudgeConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_USER_ID, "env-user"),
            (ENV_REMOTE_URL, "libsql://db.example.com/"),
            (ENV_REMOTE_TOKEN, "secret"),
        ]);
        let config = NudgeConfig {
            user_id: Some("file-user".into()),
            ..NudgeConfig::default()
        }
        .apply_env(|key| env.get(key).map(ToString::to_string))
        .unwrap();

        assert_eq!(config.user_id.as_deref(), Some("env-user"));
        let remote = config.remote.unwrap();
        assert_eq!(
            remote.target().unwrap(),
            RemoteTarget::Server {
                url: "libsql://db.example.com".into(),
                auth_token: "secret".into(),
            }
        );
        assert!(!format!("{remote:?}").contains("secret"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_zone = NudgeConfig {
            default_timezone: "Mars/Olympus".into(),
            ..NudgeConfig::default()
        };
        assert!(bad_zone.apply_env(|_| None).is_err());

        let bad_url = NudgeConfig {
            remote: Some(RemoteConfig {
                url: "ftp://example.com".into(),
                auth_token: None,
            }),
            ..NudgeConfig::default()
        };
        assert!(bad_url.apply_env(|_| None).is_err());
    }
}
