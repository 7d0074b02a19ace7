use std::path::Path;
use std::time::Duration;

use carbon_core::db::{ConnectionTarget, Database, LibSqlNoteRepository, NoteRepository};
use carbon_core::models::{EventDirection, EventKind, EventStatus, SyncEvent};
use carbon_core::services::DatabaseService;
use carbon_core::sync::{DetailAction, DetailDirection, StrategyKind, SyncDetail, SyncReport};
use carbon_core::Note;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::commands::common::{
    default_editor, format_event_line, format_relative_time, format_sync_timestamp,
    normalize_content, normalize_note_identifier, note_preview, resolve_connection, resolve_note,
    truncate_chars,
};
use crate::commands::connect::run_connect;
use crate::commands::delete::run_delete;
use crate::commands::sync::{format_report_lines, run_sync};
use crate::config::CliConfig;
use crate::error::CliError;

const USER: &str = "local";

fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |name| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_string())
    }
}

fn test_config(dir: &TempDir) -> CliConfig {
    CliConfig::from_lookup(|_| None, Some(dir.path().join("carbon.db"))).unwrap()
}

fn note_with_id(id: &str, title: &str, created_at: i64) -> Note {
    Note {
        id: id.parse().unwrap(),
        user_id: USER.to_string(),
        folder_id: None,
        title: title.to_string(),
        content: format!("{title} body"),
        created_at,
        updated_at: created_at,
    }
}

async fn seed_notes(db_path: &Path, notes: &[Note]) {
    let db = Database::open(db_path).await.unwrap();
    let repo = LibSqlNoteRepository::new(db.connection());
    for note in notes {
        repo.insert(note).await.unwrap();
    }
}

#[test]
fn config_defaults_apply_when_unset() {
    let config = CliConfig::from_lookup(|_| None, Some("/tmp/carbon-test.db".into())).unwrap();
    assert_eq!(config.user_id, "local");
    assert_eq!(config.github_api_url, "https://api.github.com");
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    assert_eq!(config.conflict_strategy, StrategyKind::LocalWins);
    assert!(config.github_token.is_none());
    assert!(config.github_client().unwrap().is_none());
}

#[test]
fn config_reads_environment_values() {
    let pairs = [
        ("CARBON_DB_PATH", " /data/carbon.db "),
        ("CARBON_USER_ID", "alice"),
        ("GITHUB_TOKEN", "ghp_secret"),
        ("GITHUB_API_URL", "https://github.example.com/api/v3/"),
        ("CARBON_HTTP_TIMEOUT_SECS", "5"),
        ("CARBON_CONFLICT_STRATEGY", "remote-wins"),
    ];
    let config = CliConfig::from_lookup(lookup_from(&pairs), None).unwrap();

    assert_eq!(config.db_path, Path::new("/data/carbon.db"));
    assert_eq!(config.user_id, "alice");
    assert_eq!(config.github_api_url, "https://github.example.com/api/v3");
    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.conflict_strategy, StrategyKind::RemoteWins);
    assert!(config.github_client().unwrap().is_some());
}

#[test]
fn db_path_flag_overrides_environment() {
    let pairs = [("CARBON_DB_PATH", "/data/carbon.db")];
    let config =
        CliConfig::from_lookup(lookup_from(&pairs), Some("/override/carbon.db".into())).unwrap();
    assert_eq!(config.db_path, Path::new("/override/carbon.db"));
}

#[test]
fn config_rejects_invalid_values() {
    let path = Some("/tmp/carbon-test.db".into());
    let bad_timeout = [("CARBON_HTTP_TIMEOUT_SECS", "0")];
    assert!(CliConfig::from_lookup(lookup_from(&bad_timeout), path.clone()).is_err());

    let not_a_number = [("CARBON_HTTP_TIMEOUT_SECS", "soon")];
    assert!(CliConfig::from_lookup(lookup_from(&not_a_number), path.clone()).is_err());

    let bad_url = [("GITHUB_API_URL", "api.github.com")];
    assert!(CliConfig::from_lookup(lookup_from(&bad_url), path.clone()).is_err());

    let bad_strategy = [("CARBON_CONFLICT_STRATEGY", "newest")];
    assert!(CliConfig::from_lookup(lookup_from(&bad_strategy), path).is_err());
}

#[test]
fn config_debug_redacts_token() {
    let pairs = [("GITHUB_TOKEN", "ghp_secret")];
    let config = CliConfig::from_lookup(lookup_from(&pairs), Some("/tmp/c.db".into())).unwrap();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("ghp_secret"));
    assert!(rendered.contains("[REDACTED]"));
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier(" \n "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn note_preview_truncates_with_ellipsis() {
    let note = Note::new(
        USER,
        "Title",
        "This is a very long sentence that should be shortened",
        0,
    );
    assert_eq!(note_preview(&note, 20), "This is a very lo...");
    assert_eq!(truncate_chars("short", 20), "short");
}

#[test]
fn format_event_line_includes_error_message() {
    let event = SyncEvent {
        id: carbon_core::models::SyncEventId::new(),
        connection_id: carbon_core::models::ConnectionId::new(),
        direction: EventDirection::Push,
        kind: EventKind::Upsert,
        note_id: None,
        file_path: Some("notes/a.md".to_string()),
        commit: None,
        status: EventStatus::Error,
        error_message: Some("Remote API error".to_string()),
        created_at: 0,
    };

    let line = format_event_line(&event);
    assert!(line.starts_with(&format_sync_timestamp(0)));
    assert!(line.contains("push"));
    assert!(line.contains("notes/a.md"));
    assert!(line.ends_with("Remote API error"));
}

#[test]
fn format_report_lines_summarize_counts_and_details() {
    let report = SyncReport {
        errors: 1,
        details: vec![
            SyncDetail {
                direction: DetailDirection::Pull,
                action: DetailAction::Created,
                path: Some("notes/a.md".to_string()),
                note_id: None,
                error: None,
            },
            SyncDetail {
                direction: DetailDirection::Push,
                action: DetailAction::Error,
                path: Some("notes/b.md".to_string()),
                note_id: None,
                error: Some("boom".to_string()),
            },
        ],
        ..SyncReport::default()
    };

    let lines = format_report_lines(&report);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("errors: 1"));
    assert!(lines[1].contains("created"));
    assert!(lines[2].ends_with("boom"));

    let quiet = format_report_lines(&SyncReport::default());
    assert!(quiet[1].contains("up to date"));
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_note_supports_exact_and_prefix_id() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    seed_notes(
        &config.db_path,
        &[
            note_with_id("11111111-1111-7111-8111-111111111111", "Note A", 1000),
            note_with_id("11111111-1111-7111-8111-222222222222", "Note B", 1001),
        ],
    )
    .await;

    let db = DatabaseService::open_path(config.db_path.clone()).await.unwrap();
    let by_exact = resolve_note("11111111-1111-7111-8111-111111111111", &db, USER)
        .await
        .unwrap();
    assert_eq!(by_exact.title, "Note A");

    let by_prefix = resolve_note("11111111-1111-7111-8111-2", &db, USER)
        .await
        .unwrap();
    assert_eq!(by_prefix.title, "Note B");

    let ambiguous = resolve_note("11111111-1111", &db, USER).await.unwrap_err();
    assert!(matches!(ambiguous, CliError::AmbiguousNoteId(_)));

    let missing = resolve_note("does-not-exist", &db, USER).await.unwrap_err();
    assert!(matches!(missing, CliError::NoteNotFound(_)));

    let other_user = resolve_note("11111111-1111-7111-8111-2", &db, "someone-else")
        .await
        .unwrap_err();
    assert!(matches!(other_user, CliError::NoteNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_delete_removes_note_by_prefix() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let keep = note_with_id("bbbbbbbb-bbbb-7bbb-8bbb-111111111111", "Keep me", 1000);
    let remove = note_with_id("bbbbbbbb-bbbb-7bbb-8bbb-222222222222", "Delete me", 1001);
    seed_notes(&config.db_path, &[keep.clone(), remove.clone()]).await;

    run_delete("bbbbbbbb-bbbb-7bbb-8bbb-2", &config).await.unwrap();

    let db = DatabaseService::open_path(config.db_path.clone()).await.unwrap();
    assert!(db.get_note(&remove.id, USER).await.unwrap().is_none());
    assert!(db.get_note(&keep.id, USER).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_connection_matches_name_and_id_prefix() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let db = DatabaseService::open_path(config.db_path.clone()).await.unwrap();
    let connection = db
        .register_connection(
            USER,
            &ConnectionTarget {
                repo_owner: "octo".to_string(),
                repo_name: "notes".to_string(),
                branch: "main".to_string(),
                base_path: String::new(),
            },
        )
        .await
        .unwrap();

    let by_name = resolve_connection("Octo/Notes", &db, USER).await.unwrap();
    assert_eq!(by_name.id, connection.id);

    let prefix = connection.id.to_string()[..8].to_string();
    let by_prefix = resolve_connection(&prefix, &db, USER).await.unwrap();
    assert_eq!(by_prefix.id, connection.id);

    let missing = resolve_connection("octo/other", &db, USER).await.unwrap_err();
    assert!(matches!(missing, CliError::ConnectionNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sync_without_token_reports_missing_credential() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    {
        let db = DatabaseService::open_path(config.db_path.clone()).await.unwrap();
        db.register_connection(
            USER,
            &ConnectionTarget {
                repo_owner: "octo".to_string(),
                repo_name: "notes".to_string(),
                branch: "main".to_string(),
                base_path: "notes".to_string(),
            },
        )
        .await
        .unwrap();
    }

    let error = run_sync("octo/notes", None, false, false, &config)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(carbon_core::Error::MissingCredential(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_connect_requires_token() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let target = ConnectionTarget {
        repo_owner: "octo".to_string(),
        repo_name: "notes".to_string(),
        branch: "main".to_string(),
        base_path: String::new(),
    };

    let error = run_connect(&target, &config).await.unwrap_err();
    assert!(matches!(error, CliError::MissingToken("connect")));
}
