use crate::commands::common::{format_note_lines, note_to_list_item, open_database, NoteListItem};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_list(as_json: bool, config: &CliConfig) -> Result<(), CliError> {
    let db = open_database(config).await?;
    let notes = db.list_notes(&config.user_id).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
