//! Shared services for frontends.

mod database;
mod reminders;

pub use database::DatabaseService;
pub use reminders::{ReminderService, SavedReminder};
