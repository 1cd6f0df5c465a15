use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use nudge_core::RepeatRule;

#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Reminders that fire once, on time, on every device")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new reminder
    #[command(alias = "new")]
    Add {
        /// Reminder title
        title: Vec<String>,
        /// Event time: RFC 3339, or "YYYY-MM-DD HH:MM" in the reminder's zone
        #[arg(long, value_name = "TIME")]
        at: String,
        /// IANA timezone (defaults to the configured zone)
        #[arg(long, value_name = "ZONE")]
        tz: Option<String>,
        #[arg(long, value_enum, default_value_t = RepeatArg::None)]
        repeat: RepeatArg,
        /// Notify this long before the event (e.g. 15m, 1h, 1day); repeatable
        #[arg(long = "offset", value_name = "DURATION")]
        offsets: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List reminders
    List {
        /// Include disabled reminders
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing reminder
    Edit {
        /// Reminder ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_name = "TIME")]
        at: Option<String>,
        #[arg(long, value_name = "ZONE")]
        tz: Option<String>,
        #[arg(long, value_enum)]
        repeat: Option<RepeatArg>,
        /// Replace the offsets; repeatable
        #[arg(long = "offset", value_name = "DURATION", conflicts_with = "clear_offsets")]
        offsets: Vec<String>,
        /// Drop all offsets, leaving only the at-time alarm
        #[arg(long)]
        clear_offsets: bool,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a reminder on every device
    Delete {
        /// Reminder ID or unique ID prefix
        id: String,
    },
    /// Enable a reminder and arm its alarms
    Enable {
        /// Reminder ID or unique ID prefix
        id: String,
    },
    /// Disable a reminder and cancel its alarms
    Disable {
        /// Reminder ID or unique ID prefix
        id: String,
    },
    /// Dismiss a fired notification
    Dismiss {
        /// Reminder ID or unique ID prefix
        id: String,
        /// Offset of the notification to dismiss
        #[arg(long, value_name = "DURATION", default_value = "0")]
        offset: String,
    },
    /// Sync reminders with the remote store
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Run the reminder daemon: fire alarms and sync periodically
    Run,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Output file, or a directory to write the conventionally named script into
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently recorded sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete remote tombstones older than a cutoff
    Purge {
        /// Minimum tombstone age (defaults to the configured age)
        #[arg(long, value_name = "DURATION")]
        older_than: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RepeatArg {
    None,
    EveryMinute,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<RepeatArg> for RepeatRule {
    fn from(value: RepeatArg) -> Self {
        match value {
            RepeatArg::None => Self::None,
            RepeatArg::EveryMinute => Self::EveryMinute,
            RepeatArg::Daily => Self::Daily,
            RepeatArg::Weekly => Self::Weekly,
            RepeatArg::Monthly => Self::Monthly,
            RepeatArg::Yearly => Self::Yearly,
        }
    }
}
