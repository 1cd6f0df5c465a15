use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] nudge_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Reminder title cannot be empty")]
    EmptyTitle,
    #[error("Invalid time '{0}': use RFC 3339 or \"YYYY-MM-DD HH:MM\"")]
    InvalidTime(String),
    #[error("{0} does not exist in timezone {1}")]
    NonexistentLocalTime(String, String),
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("Invalid duration '{0}': {1}")]
    InvalidDuration(String, String),
    #[error("Could not determine a default database path; pass --db-path")]
    NoDataDir,
    #[error(
        "Sync is not configured. Set `remote` in the config file, or NUDGE_REMOTE_URL and NUDGE_REMOTE_TOKEN."
    )]
    SyncNotConfigured,
    #[error("Sync needs a signed-in user. Set `user_id` in the config file or NUDGE_USER_ID.")]
    NotSignedIn,
    #[error("Sync failed and will be retried: {0}")]
    SyncFailed(String),
}
