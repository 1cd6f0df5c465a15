//! Nudge CLI - reminders from the command line
//!
//! One-shot commands edit the local store; `nudge run` keeps alarms armed
//! and syncs in the background.

mod cli;
mod commands;
mod error;
mod host;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::{run_add, AddArgs};
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::dismiss::run_dismiss;
use crate::commands::edit::{run_edit, EditArgs};
use crate::commands::list::run_list;
use crate::commands::run::run_daemon;
use crate::commands::sync::{run_sync, run_sync_conflicts, run_sync_purge};
use crate::commands::toggle::run_set_enabled;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "nudge=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let context = CliContext::resolve(cli.db_path, cli.config.as_deref())?;
    match command {
        Commands::Add {
            title,
            at,
            tz,
            repeat,
            offsets,
            description,
        } => {
            let args = AddArgs {
                title: &title,
                at: &at,
                tz: tz.as_deref(),
                repeat: repeat.into(),
                offsets: &offsets,
                description,
            };
            run_add(args, &context).await?;
        }
        Commands::List { all, json } => run_list(all, json, &context).await?,
        Commands::Edit {
            id,
            title,
            at,
            tz,
            repeat,
            offsets,
            clear_offsets,
            description,
        } => {
            let args = EditArgs {
                title: title.as_deref(),
                at: at.as_deref(),
                tz: tz.as_deref(),
                repeat: repeat.map(Into::into),
                offsets: &offsets,
                clear_offsets,
                description,
            };
            run_edit(&id, args, &context).await?;
        }
        Commands::Delete { id } => run_delete(&id, &context).await?,
        Commands::Enable { id } => run_set_enabled(&id, true, &context).await?,
        Commands::Disable { id } => run_set_enabled(&id, false, &context).await?,
        Commands::Dismiss { id, offset } => run_dismiss(&id, &offset, &context).await?,
        Commands::Sync { command } => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, &context).await?;
            }
            Some(SyncCommands::Purge { older_than }) => {
                run_sync_purge(older_than.as_deref(), &context).await?;
            }
            None => run_sync(&context).await?,
        },
        Commands::Run => run_daemon(&context).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
