use carbon_core::sync::{StrategyKind, SyncMode, SyncReport};

use crate::commands::common::{open_database, resolve_connection};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_sync(
    query: &str,
    strategy: Option<StrategyKind>,
    pull_only: bool,
    as_json: bool,
    config: &CliConfig,
) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let connection = resolve_connection(query, &db, &config.user_id).await?;
    let client = config.github_client()?;
    let mode = if pull_only {
        SyncMode::PullOnly
    } else {
        SyncMode::Bidirectional
    };

    let report = db
        .run_sync(
            &connection.id,
            &config.user_id,
            client.as_ref(),
            strategy.unwrap_or(config.conflict_strategy),
            mode,
        )
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "pulled: {} created, {} updated, {} deleted | pushed: {} created, {} updated, {} deleted | conflicts: {} resolved, {} skipped | errors: {}",
        report.pulled.created,
        report.pulled.updated,
        report.pulled.deleted,
        report.pushed.created,
        report.pushed.updated,
        report.pushed.deleted,
        report.conflicts.resolved,
        report.conflicts.skipped,
        report.errors
    )];

    for detail in &report.details {
        let mut line = format!(
            "  {:<8}  {:<16}  {}",
            detail.direction.as_str(),
            detail.action.as_str(),
            detail.path.as_deref().unwrap_or("-")
        );
        if let Some(error) = detail.error.as_deref() {
            line.push_str("  ");
            line.push_str(error);
        }
        lines.push(line);
    }

    if report.details.is_empty() {
        lines.push("  everything up to date".to_string());
    }
    lines
}
