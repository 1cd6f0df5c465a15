use crate::commands::common::{open_app, parse_offset, CliContext};
use crate::error::CliError;

pub async fn run_dismiss(id: &str, offset: &str, context: &CliContext) -> Result<(), CliError> {
    let offset_millis = parse_offset(offset)?;
    let app = open_app(context).await?;
    let reminder_id = app.reminders.resolve_id(id).await?;
    app.receiver.on_dismissed(&reminder_id, offset_millis).await?;
    println!("{reminder_id}");
    Ok(())
}
