use carbon_core::services::ConnectionOverview;

use crate::commands::common::{format_connection_line, format_event_line, open_database};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_status(as_json: bool, config: &CliConfig) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let mut overviews = Vec::new();
    for connection in db.list_connections(&config.user_id).await? {
        overviews.push(db.connection_status(&connection.id, &config.user_id).await?);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&overviews)?);
        return Ok(());
    }

    if overviews.is_empty() {
        println!("No repositories connected. Run `carbon connect` to add one.");
        return Ok(());
    }

    for line in format_status_lines(&overviews) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(overviews: &[ConnectionOverview]) -> Vec<String> {
    let mut lines = Vec::new();
    for overview in overviews {
        lines.push(format_connection_line(&overview.connection));
        if overview.recent_events.is_empty() {
            lines.push("  no sync events yet".to_string());
        }
        for event in &overview.recent_events {
            lines.push(format!("  {}", format_event_line(event)));
        }
    }
    lines
}
