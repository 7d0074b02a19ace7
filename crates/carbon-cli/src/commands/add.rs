use crate::commands::common::{open_database, resolve_note_body};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    body_parts: &[String],
    config: &CliConfig,
) -> Result<(), CliError> {
    let body = resolve_note_body(body_parts)?;

    let db = open_database(config).await?;
    let note = db.create_note(&config.user_id, title, &body).await?;

    println!("{}", note.id);
    Ok(())
}
