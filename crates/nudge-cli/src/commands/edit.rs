use nudge_core::models::normalize_offsets;
use nudge_core::{ReminderDraft, RepeatRule};

use crate::commands::common::{
    format_local_time, normalize_title, open_app, parse_event_time, parse_offsets, parse_timezone,
    CliContext,
};
use crate::error::CliError;

/// Fields to change; `None` keeps the stored value
#[derive(Default)]
pub struct EditArgs<'a> {
    pub title: Option<&'a str>,
    pub at: Option<&'a str>,
    pub tz: Option<&'a str>,
    pub repeat: Option<RepeatRule>,
    pub offsets: &'a [String],
    pub clear_offsets: bool,
    pub description: Option<String>,
}

pub async fn run_edit(id: &str, args: EditArgs<'_>, context: &CliContext) -> Result<(), CliError> {
    let app = open_app(context).await?;
    let reminder_id = app.reminders.resolve_id(id).await?;
    let current = app.reminders.get(&reminder_id).await?;

    let zone = parse_timezone(args.tz.unwrap_or(&current.timezone))?;
    let title = match args.title {
        Some(title) => normalize_title(&[title.to_string()])?,
        None => current.title.clone(),
    };
    let event_at = match args.at {
        Some(at) => parse_event_time(at, zone)?,
        None => current.event_at,
    };
    let offsets = if args.clear_offsets {
        Vec::new()
    } else if args.offsets.is_empty() {
        current.offsets.clone()
    } else {
        parse_offsets(args.offsets)?
    };

    let draft = ReminderDraft {
        title,
        description: args.description.or_else(|| current.description.clone()),
        event_at,
        timezone: zone.name().to_string(),
        repeat: args.repeat.unwrap_or(current.repeat),
        offsets,
    };
    if draft.title == current.title
        && draft.description == current.description
        && draft.event_at == current.event_at
        && draft.timezone == current.timezone
        && draft.repeat == current.repeat
        && normalize_offsets(draft.offsets.clone()) == current.offsets
    {
        println!("{}", current.id);
        return Ok(());
    }

    let saved = app.reminders.update(&reminder_id, draft).await?;
    println!("{}", saved.reminder.id);
    if let Some(next) = saved.next_occurrence {
        println!("Next: {}", format_local_time(next, &saved.reminder.timezone));
    }
    Ok(())
}
