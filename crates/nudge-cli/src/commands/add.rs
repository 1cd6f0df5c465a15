use nudge_core::{ReminderDraft, RepeatRule};

use crate::commands::common::{
    format_local_time, normalize_title, open_app, parse_event_time, parse_offsets, parse_timezone,
    CliContext,
};
use crate::error::CliError;

pub struct AddArgs<'a> {
    pub title: &'a [String],
    pub at: &'a str,
    pub tz: Option<&'a str>,
    pub repeat: RepeatRule,
    pub offsets: &'a [String],
    pub description: Option<String>,
}

pub async fn run_add(args: AddArgs<'_>, context: &CliContext) -> Result<(), CliError> {
    let title = normalize_title(args.title)?;
    let zone = parse_timezone(args.tz.unwrap_or(&context.config.default_timezone))?;
    let draft = ReminderDraft {
        title,
        description: args.description,
        event_at: parse_event_time(args.at, zone)?,
        timezone: zone.name().to_string(),
        repeat: args.repeat,
        offsets: parse_offsets(args.offsets)?,
    };

    let app = open_app(context).await?;
    let saved = app.reminders.create(draft).await?;

    println!("{}", saved.reminder.id);
    if let Some(next) = saved.next_occurrence {
        println!("Next: {}", format_local_time(next, &saved.reminder.timezone));
    } else {
        println!("Already elapsed; no alarm armed");
    }
    Ok(())
}
