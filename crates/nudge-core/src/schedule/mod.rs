//! Reminder scheduling: occurrence math, alarm slots, and the flows that
//! keep platform alarms in step with stored reminders.

mod alarm_id;
mod elapsed;
mod engine;
mod occurrence;
mod scheduler;

pub use alarm_id::slot_id;
pub use elapsed::ElapsedReminderHandler;
pub use engine::{BootRestoreSummary, SchedulingEngine};
pub use occurrence::next_occurrence;
pub use scheduler::{AlarmContent, AlarmScheduler, ScheduleOutcome};
