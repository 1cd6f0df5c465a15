//! nudge-core - Core library for Nudge
//!
//! Reminder scheduling, per-offset fire-state tracking, and tombstone-aware
//! sync, shared by every Nudge frontend. Platform alarms, the notification
//! tray, the clock and the signed-in session are supplied by the host
//! through the traits in [`platform`], [`clock`] and [`auth`].

pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod platform;
pub mod schedule;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use app::{ColdStartSummary, HostServices, NudgeApp};
pub use error::{Error, Result};
pub use models::{Reminder, ReminderDraft, ReminderId, RepeatRule};
