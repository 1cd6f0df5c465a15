use crate::commands::common::{open_app, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, context: &CliContext) -> Result<(), CliError> {
    let app = open_app(context).await?;
    let reminder_id = app.reminders.resolve_id(id).await?;
    app.reminders.delete(&reminder_id).await?;
    println!("{reminder_id}");
    Ok(())
}
