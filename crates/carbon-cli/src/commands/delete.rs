use crate::commands::common::{normalize_note_identifier, open_database, resolve_note};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_delete(id: &str, config: &CliConfig) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let db = open_database(config).await?;
    let note = resolve_note(&normalized_id, &db, &config.user_id).await?;

    db.delete_note(&note.id, &config.user_id).await?;
    println!("{}", note.id);
    Ok(())
}
