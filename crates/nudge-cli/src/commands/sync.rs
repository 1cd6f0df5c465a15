use nudge_core::sync::{EntitySyncReport, SyncOutcome};

use crate::commands::common::{
    format_sync_conflict_lines, open_app, parse_max_age, sync_conflict_to_item, CliContext,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(context: &CliContext) -> Result<(), CliError> {
    let app = open_app(context).await?;
    match app.sync().await {
        SyncOutcome::NotConfigured => Err(CliError::SyncNotConfigured),
        SyncOutcome::NotAuthenticated => Err(CliError::NotSignedIn),
        SyncOutcome::Completed(reports) => {
            for report in &reports {
                println!("{}", format_sync_report(report));
            }
            println!("Sync completed");
            Ok(())
        }
        SyncOutcome::Retry { reports, error } => {
            for report in &reports {
                println!("{}", format_sync_report(report));
            }
            Err(CliError::SyncFailed(error))
        }
    }
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let app = open_app(context).await?;
    let conflicts = app.db.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_purge(older_than: Option<&str>, context: &CliContext) -> Result<(), CliError> {
    let max_age = match older_than {
        Some(input) => parse_max_age(input)?,
        None => context.config.tombstone_max_age(),
    };

    let app = open_app(context).await?;
    let Some(engine) = app.sync_engine() else {
        return Err(CliError::SyncNotConfigured);
    };
    let purged = engine.purge_remote_tombstones(max_age).await?;
    println!("Purged {purged} tombstone(s)");
    Ok(())
}

pub fn format_sync_report(report: &EntitySyncReport) -> String {
    format!(
        "{}: uploaded {}, tombstones {}, applied {}, deleted {}, conflicts {}, failed {}",
        report.entity_key,
        report.uploaded,
        report.tombstones_pushed,
        report.applied_ids.len(),
        report.deleted_ids.len(),
        report.conflicts,
        report.failed
    )
}
