use crate::commands::common::{format_local_time, open_app, CliContext};
use crate::error::CliError;

pub async fn run_set_enabled(id: &str, enabled: bool, context: &CliContext) -> Result<(), CliError> {
    let app = open_app(context).await?;
    let reminder_id = app.reminders.resolve_id(id).await?;
    let saved = app.reminders.set_enabled(&reminder_id, enabled).await?;

    println!("{}", saved.reminder.id);
    match (enabled, saved.next_occurrence) {
        (false, _) => {}
        (true, Some(next)) => {
            println!("Next: {}", format_local_time(next, &saved.reminder.timezone));
        }
        (true, None) => println!("Already elapsed; no alarm armed"),
    }
    Ok(())
}
