use carbon_core::db::ConnectionTarget;

use crate::commands::common::{
    format_connection_line, open_database, require_github_client, resolve_connection,
};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_connect(target: &ConnectionTarget, config: &CliConfig) -> Result<(), CliError> {
    let client = require_github_client(config, "connect")?;
    let db = open_database(config).await?;
    let connection = db.connect(&config.user_id, target, &client).await?;

    println!("{}", connection.id);
    println!("{}", format_connection_line(&connection));
    Ok(())
}

pub async fn run_disconnect(query: &str, config: &CliConfig) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let connection = resolve_connection(query, &db, &config.user_id).await?;

    db.disconnect(&connection.id, &config.user_id).await?;
    println!("Disconnected {}", connection.full_name());
    Ok(())
}

pub async fn run_pause(query: &str, config: &CliConfig) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let connection = resolve_connection(query, &db, &config.user_id).await?;

    let connection = db.pause(&connection.id, &config.user_id).await?;
    println!("{}", format_connection_line(&connection));
    Ok(())
}

pub async fn run_resume(query: &str, config: &CliConfig) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let connection = resolve_connection(query, &db, &config.user_id).await?;

    let connection = db.resume(&connection.id, &config.user_id).await?;
    println!("{}", format_connection_line(&connection));
    Ok(())
}
