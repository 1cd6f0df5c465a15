//! What happens after an alarm fires: tray notifications and fire-state.

mod receiver;
mod restore;

pub use receiver::{AlarmReceiver, FireOutcome};
pub use restore::NotificationRestoreManager;

use crate::models::{ReminderId, AT_TIME_OFFSET};
use crate::platform::{Notification, NotificationImportance};
use crate::schedule::slot_id;
use crate::util::describe_offset;

/// Build the tray entry for a slot; its id matches the alarm slot id.
pub(crate) fn build_notification(
    reminder_id: &ReminderId,
    offset_millis: i64,
    title: &str,
    message: Option<&str>,
    importance: NotificationImportance,
) -> Notification {
    let body = if offset_millis == AT_TIME_OFFSET {
        message.unwrap_or("It's time").to_string()
    } else {
        let lead = format!("Starts in {}", describe_offset(offset_millis));
        match message {
            Some(message) => format!("{lead}: {message}"),
            None => lead,
        }
    };

    Notification {
        id: slot_id(reminder_id, offset_millis),
        reminder_id: reminder_id.clone(),
        offset_millis,
        title: title.to_string(),
        body,
        importance,
    }
}
