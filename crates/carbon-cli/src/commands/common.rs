use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use carbon_core::models::{SyncConnection, SyncEvent};
use carbon_core::services::DatabaseService;
use carbon_core::sync::GitHubClient;
use carbon_core::{Note, NoteId};
use chrono::Utc;
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

pub async fn open_database(config: &CliConfig) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(config.db_path.clone()).await?)
}

/// GitHub client for commands that cannot run without a token
pub fn require_github_client(
    config: &CliConfig,
    command: &'static str,
) -> Result<GitHubClient, CliError> {
    config
        .github_client()?
        .ok_or(CliError::MissingToken(command))
}

pub async fn resolve_note(
    note_query: &str,
    db: &DatabaseService,
    user_id: &str,
) -> Result<Note, CliError> {
    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(note) = db.get_note(&note_id, user_id).await? {
            return Ok(note);
        }
    }

    let mut matching = db
        .list_notes(user_id)
        .await?
        .into_iter()
        .filter(|note| note.id.to_string().starts_with(note_query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(note_query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(&note.id.to_string()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Find a connection by exact ID, ID prefix, or `owner/repo`.
pub async fn resolve_connection(
    query: &str,
    db: &DatabaseService,
    user_id: &str,
) -> Result<SyncConnection, CliError> {
    let query = query.trim();
    let mut matching = db
        .list_connections(user_id)
        .await?
        .into_iter()
        .filter(|connection| {
            connection.full_name().eq_ignore_ascii_case(query)
                || (!query.is_empty() && connection.id.to_string().starts_with(query))
        })
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::ConnectionNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .map(SyncConnection::full_name)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousConnection(format!(
                "Connection '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.id.to_string());
            let title = truncate_chars(&note.title, 24);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!("{short_id:<13}  {title:<24}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let collapsed = note
        .preview(usize::MAX)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&collapsed, max_chars)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_connection_line(connection: &SyncConnection) -> String {
    let base_path = if connection.base_path.is_empty() {
        "/"
    } else {
        connection.base_path.as_str()
    };
    let last_synced = connection
        .last_synced_at
        .map_or_else(|| "never".to_string(), format_sync_timestamp);

    format!(
        "{}  {}@{}:{}  {}  last sync: {}",
        short_id(&connection.id.to_string()),
        connection.full_name(),
        connection.branch,
        base_path,
        connection.status,
        last_synced
    )
}

pub fn format_event_line(event: &SyncEvent) -> String {
    let mut line = format!(
        "{}  {:<4}  {:<8}  {:<8}  {}",
        format_sync_timestamp(event.created_at),
        event.direction.as_str(),
        event.kind.as_str(),
        event.status.as_str(),
        event.file_path.as_deref().unwrap_or("-")
    );
    if let Some(message) = event.error_message.as_deref() {
        line.push_str("  ");
        line.push_str(message);
    }
    line
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Body from the command line, else piped stdin, else empty.
pub fn resolve_note_body(body_parts: &[String]) -> Result<String, CliError> {
    if let Some(body) = normalize_content(&body_parts.join(" ")) {
        return Ok(body);
    }
    Ok(read_piped_stdin()?.unwrap_or_default())
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("carbon-note-{}-{now}.md", std::process::id()))
}
