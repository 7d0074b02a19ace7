use crate::commands::common::{
    capture_editor_input_with_initial, normalize_note_identifier, open_database, resolve_note,
};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    body: Option<&str>,
    config: &CliConfig,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let db = open_database(config).await?;
    let note = resolve_note(&normalized_id, &db, &config.user_id).await?;

    if title.is_some() || body.is_some() {
        let updated = db
            .update_note(&note.id, &config.user_id, title, body)
            .await?;
        println!("{}", updated.id);
        return Ok(());
    }

    let Some(edited_content) = capture_editor_input_with_initial(&note.content)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited_content == note.content {
        println!("{}", note.id);
        return Ok(());
    }

    let updated = db
        .update_note(&note.id, &config.user_id, None, Some(&edited_content))
        .await?;
    println!("{}", updated.id);
    Ok(())
}
