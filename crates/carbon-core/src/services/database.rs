//! Shared database service wrapper used by clients.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::db::{
    ConnectionTarget, Database, LibSqlNoteRepository, LibSqlSyncRepository, NoteRepository,
    SyncRepository,
};
use crate::models::{ConnectionId, ConnectionStatus, SyncConnection, SyncEvent};
use crate::sync::{
    load_active_connection, GitHubClient, RemoteContentClient, StrategyKind, SyncEngine,
    SyncMode, SyncReport,
};
use crate::{Error, Note, NoteId, Result};

/// Number of events returned by [`DatabaseService::connection_status`]
pub const RECENT_EVENT_LIMIT: usize = 20;

/// A connection together with its latest events
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionOverview {
    pub connection: SyncConnection,
    pub recent_events: Vec<SyncEvent>,
}

/// Thread-safe service for DB, repository and sync operations.
///
/// The database lock is held for a whole sync pass, so passes started through
/// one service never overlap.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            clock: Arc::new(SystemClock),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock behind every timestamp this service writes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Filesystem location, `None` when in memory
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// List a user's notes newest-first.
    pub async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        repo.list_for_user(user_id).await
    }

    /// Fetch a note owned by `user_id`.
    pub async fn get_note(&self, id: &NoteId, user_id: &str) -> Result<Option<Note>> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        repo.get_owned(id, user_id).await
    }

    /// Create a new note.
    pub async fn create_note(&self, user_id: &str, title: &str, content: &str) -> Result<Note> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        repo.create(user_id, title, content, self.clock.now_ms())
            .await
    }

    /// Update a note's title and/or body. Omitted fields keep their value.
    pub async fn update_note(
        &self,
        id: &NoteId,
        user_id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Note> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        let existing = repo
            .get_owned(id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        repo.update(
            id,
            title.unwrap_or(&existing.title),
            content.unwrap_or(&existing.content),
            self.clock.now_ms(),
        )
        .await
    }

    /// Delete a note. A linked remote file is removed on the next pass.
    pub async fn delete_note(&self, id: &NoteId, user_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        if repo.get_owned(id, user_id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        repo.delete(id, self.clock.now_ms()).await
    }

    /// Connect a repository after checking the token can read it.
    ///
    /// Transport failures surface as [`Error::Remote`]; a token that cannot
    /// see the repository is [`Error::InvalidInput`].
    pub async fn connect(
        &self,
        user_id: &str,
        target: &ConnectionTarget,
        client: &GitHubClient,
    ) -> Result<SyncConnection> {
        let repository = client.repository(&target.repo_owner, &target.repo_name);
        let accessible = repository.verify_access().await?;
        if !accessible {
            return Err(Error::InvalidInput(format!(
                "repository {}/{} is not accessible with the configured token",
                target.repo_owner, target.repo_name
            )));
        }

        self.register_connection(user_id, target).await
    }

    /// Create or reactivate a connection without contacting the remote.
    pub async fn register_connection(
        &self,
        user_id: &str,
        target: &ConnectionTarget,
    ) -> Result<SyncConnection> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let connection = repo
            .upsert_connection(user_id, target, self.clock.now_ms())
            .await?;
        tracing::info!(
            connection = %connection.full_name(),
            branch = %connection.branch,
            "Connection registered"
        );
        Ok(connection)
    }

    /// Remove a connection with its links and events. Notes are kept.
    pub async fn disconnect(&self, id: &ConnectionId, user_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.delete_connection(id, user_id).await
    }

    /// Refuse passes until resumed.
    pub async fn pause(&self, id: &ConnectionId, user_id: &str) -> Result<SyncConnection> {
        self.set_status(id, user_id, ConnectionStatus::Paused).await
    }

    pub async fn resume(&self, id: &ConnectionId, user_id: &str) -> Result<SyncConnection> {
        self.set_status(id, user_id, ConnectionStatus::Active).await
    }

    async fn set_status(
        &self,
        id: &ConnectionId,
        user_id: &str,
        status: ConnectionStatus,
    ) -> Result<SyncConnection> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.set_status(id, user_id, status, self.clock.now_ms())
            .await
    }

    pub async fn list_connections(&self, user_id: &str) -> Result<Vec<SyncConnection>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        repo.list_connections(user_id).await
    }

    /// Connection with its most recent events, newest first.
    pub async fn connection_status(
        &self,
        id: &ConnectionId,
        user_id: &str,
    ) -> Result<ConnectionOverview> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let connection = repo
            .get_connection(id, user_id)
            .await?
            .ok_or_else(|| Error::ConnectionNotFound(id.to_string()))?;
        let recent_events = repo.list_recent_events(id, RECENT_EVENT_LIMIT).await?;
        Ok(ConnectionOverview {
            connection,
            recent_events,
        })
    }

    /// Run one sync pass against GitHub.
    pub async fn run_sync(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        client: Option<&GitHubClient>,
        strategy: StrategyKind,
        mode: SyncMode,
    ) -> Result<SyncReport> {
        let db = self.db.lock().await;
        let connection = load_active_connection(db.connection(), connection_id, user_id)
            .await
            .inspect_err(log_rejected)?;
        let client = client
            .ok_or_else(|| Error::MissingCredential("no GitHub token configured".to_string()))
            .inspect_err(log_rejected)?;
        let remote = client.repository(&connection.repo_owner, &connection.repo_name);
        self.run_pass(&db, &connection, &remote, strategy, mode).await
    }

    /// Run one sync pass against any remote content client.
    pub async fn run_sync_with<R: RemoteContentClient>(
        &self,
        connection_id: &ConnectionId,
        user_id: &str,
        remote: &R,
        strategy: StrategyKind,
        mode: SyncMode,
    ) -> Result<SyncReport> {
        let db = self.db.lock().await;
        let connection = load_active_connection(db.connection(), connection_id, user_id)
            .await
            .inspect_err(log_rejected)?;
        self.run_pass(&db, &connection, remote, strategy, mode).await
    }

    async fn run_pass<R: RemoteContentClient>(
        &self,
        db: &Database,
        connection: &SyncConnection,
        remote: &R,
        strategy: StrategyKind,
        mode: SyncMode,
    ) -> Result<SyncReport> {
        tracing::info!(
            connection = %connection.full_name(),
            %strategy,
            ?mode,
            "Starting sync pass"
        );
        SyncEngine::new(db.connection(), remote, self.clock.as_ref())
            .with_strategy(strategy.strategy())
            .with_mode(mode)
            .run(connection)
            .await
    }
}

fn log_rejected(error: &Error) {
    if error.is_connection_invalid() {
        tracing::warn!(%error, "Sync pass rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::sync::{
        DeleteReceipt, PutReceipt, RemoteEntry, RemoteError, RemoteFile, RemoteResult,
        WriteOutcome,
    };
    use pretty_assertions::assert_eq;

    const USER: &str = "user-1";

    /// Repository with no files that accepts every write
    struct EmptyRemote;

    impl RemoteContentClient for EmptyRemote {
        async fn list_directory(&self, _path: &str, _reference: &str) -> RemoteResult<Vec<RemoteEntry>> {
            Ok(Vec::new())
        }

        async fn get_file(&self, _path: &str, _reference: &str) -> RemoteResult<Option<RemoteFile>> {
            Ok(None)
        }

        async fn put_file(
            &self,
            _path: &str,
            _bytes: &[u8],
            _message: &str,
            _branch: &str,
            _expected_revision: Option<&str>,
        ) -> RemoteResult<WriteOutcome<PutReceipt>> {
            Ok(WriteOutcome::Applied(PutReceipt {
                revision: "rev-1".to_string(),
                commit: None,
            }))
        }

        async fn delete_file(
            &self,
            _path: &str,
            _message: &str,
            _branch: &str,
            _revision: &str,
        ) -> RemoteResult<WriteOutcome<DeleteReceipt>> {
            Ok(WriteOutcome::NotFound)
        }

        async fn latest_commit(&self, _branch: &str) -> RemoteResult<Option<String>> {
            Ok(None)
        }
    }

    fn target() -> ConnectionTarget {
        ConnectionTarget {
            repo_owner: "octo".to_string(),
            repo_name: "notes".to_string(),
            branch: "main".to_string(),
            base_path: "/journal/".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_create_and_list_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        service.create_note(USER, "Hello", "hello core").await.unwrap();
        let notes = service.list_notes(USER).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "hello core");
        assert!(service.list_notes("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_note_keeps_omitted_fields() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let note = service.create_note(USER, "Title", "body").await.unwrap();

        let updated = service
            .update_note(&note.id, USER, None, Some("new body"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.content, "new body");

        let err = service
            .update_note(&note.id, "intruder", Some("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_note_is_scoped_to_owner() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let note = service.create_note(USER, "Title", "").await.unwrap();

        assert!(service.delete_note(&note.id, "intruder").await.is_err());
        service.delete_note(&note.id, USER).await.unwrap();
        assert!(service.get_note(&note.id, USER).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pause_blocks_sync_until_resumed() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let connection = service.register_connection(USER, &target()).await.unwrap();
        assert_eq!(connection.base_path, "journal");

        service.pause(&connection.id, USER).await.unwrap();
        let err = service
            .run_sync_with(
                &connection.id,
                USER,
                &EmptyRemote,
                StrategyKind::default(),
                SyncMode::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionPaused(_)));

        service.resume(&connection.id, USER).await.unwrap();
        service.create_note(USER, "First", "hello").await.unwrap();
        let report = service
            .run_sync_with(
                &connection.id,
                USER,
                &EmptyRemote,
                StrategyKind::default(),
                SyncMode::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.pushed.created, 1);

        let overview = service.connection_status(&connection.id, USER).await.unwrap();
        assert!(overview.connection.last_synced_at.is_some());
        assert_eq!(overview.recent_events.len(), 1);
        assert_eq!(
            overview.recent_events[0].file_path.as_deref(),
            Some("journal/First.md")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_sync_without_token_reports_missing_credential() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let connection = service.register_connection(USER, &target()).await.unwrap();

        let err = service
            .run_sync(
                &connection.id,
                USER,
                None,
                StrategyKind::LocalWins,
                SyncMode::Bidirectional,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_connection_is_rejected_before_credentials() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let err = service
            .run_sync(
                &ConnectionId::new(),
                USER,
                None,
                StrategyKind::LocalWins,
                SyncMode::Bidirectional,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnect_removes_connection_but_keeps_notes() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let connection = service.register_connection(USER, &target()).await.unwrap();
        service.create_note(USER, "Kept", "").await.unwrap();

        service.disconnect(&connection.id, USER).await.unwrap();
        assert!(service.list_connections(USER).await.unwrap().is_empty());
        assert_eq!(service.list_notes(USER).await.unwrap().len(), 1);
        assert!(matches!(
            service.connection_status(&connection.id, USER).await,
            Err(Error::ConnectionNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn note_writes_use_service_clock() {
        let clock = Arc::new(ManualClock::new(5_000));
        let service = DatabaseService::open_in_memory()
            .await
            .unwrap()
            .with_clock(clock.clone());
        let connection = service.register_connection(USER, &target()).await.unwrap();
        assert_eq!(connection.created_at, 5_000);

        let note = service.create_note(USER, "Timed", "body").await.unwrap();
        assert_eq!((note.created_at, note.updated_at), (5_000, 5_000));

        clock.advance(250);
        let updated = service
            .update_note(&note.id, USER, None, Some("later"))
            .await
            .unwrap();
        assert_eq!(updated.updated_at, 5_250);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_reports_unreachable_remote_as_remote_error() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let client =
            GitHubClient::new("token", "http://127.0.0.1:1", Duration::from_secs(2)).unwrap();

        let err = service.connect(USER, &target(), &client).await.unwrap_err();
        assert!(
            matches!(err, Error::Remote(RemoteError::Http(_))),
            "unexpected error: {err:?}"
        );
        assert!(service.list_connections(USER).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("carbon.db");
        let service = DatabaseService::open_path(&path).await.unwrap();
        assert_eq!(service.db_path(), Some(&path));
        assert!(path.exists());
    }
}
