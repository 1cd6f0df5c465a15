use chrono::Utc;

use crate::commands::common::{
    format_reminder_lines, open_app, reminder_to_list_item, CliContext, ReminderListItem,
};
use crate::error::CliError;

pub async fn run_list(include_disabled: bool, as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let app = open_app(context).await?;
    let reminders = app.reminders.list(include_disabled).await?;
    let now = Utc::now();

    if as_json {
        let json_items = reminders
            .iter()
            .map(|reminder| reminder_to_list_item(reminder, now))
            .collect::<Vec<ReminderListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if reminders.is_empty() {
        println!("No reminders.");
    } else {
        for line in format_reminder_lines(&reminders, now) {
            println!("{line}");
        }
    }

    Ok(())
}
