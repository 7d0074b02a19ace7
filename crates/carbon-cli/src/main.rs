//! Carbon CLI - notes mirrored to a repository of Markdown files
//!
//! Capture notes locally, connect a repository branch, and run sync passes.

mod cli;
mod commands;
mod config;
mod error;
#[cfg(test)]
mod tests;

use carbon_core::db::ConnectionTarget;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, NoteCommands};
use crate::commands::add::run_add;
use crate::commands::connect::{run_connect, run_disconnect, run_pause, run_resume};
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::repos::run_repos;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::config::CliConfig;
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

    let filter = EnvFilter::from_default_env();
    let filter = match "carbon=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env(cli.db_path)?;
    tracing::debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Note { command } => match command {
            NoteCommands::Add { title, body } => run_add(&title, &body, &config).await?,
            NoteCommands::List { json } => run_list(json, &config).await?,
            NoteCommands::Edit { id, title, body } => {
                run_edit(&id, title.as_deref(), body.as_deref(), &config).await?;
            }
            NoteCommands::Delete { id } => run_delete(&id, &config).await?,
        },
        Commands::Connect {
            owner,
            repo,
            branch,
            base_path,
        } => {
            let target = ConnectionTarget {
                repo_owner: owner,
                repo_name: repo,
                branch,
                base_path,
            };
            run_connect(&target, &config).await?;
        }
        Commands::Disconnect { connection } => run_disconnect(&connection, &config).await?,
        Commands::Pause { connection } => run_pause(&connection, &config).await?,
        Commands::Resume { connection } => run_resume(&connection, &config).await?,
        Commands::Status { json } => run_status(json, &config).await?,
        Commands::Sync {
            connection,
            strategy,
            pull_only,
            json,
        } => run_sync(&connection, strategy, pull_only, json, &config).await?,
        Commands::Repos { json } => run_repos(json, &config).await?,
    }

    Ok(())
}
