//! Database layer for Nudge

mod connection;
mod fire_state_repository;
mod migrations;
mod reminder_repository;
mod sync_repository;

pub use connection::Database;
pub use fire_state_repository::{FireStateRepository, LibSqlFireStateRepository};
pub use reminder_repository::{LibSqlReminderRepository, ReminderRepository};
pub use sync_repository::{LibSqlSyncRepository, SyncRepository};
