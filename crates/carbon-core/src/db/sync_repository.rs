//! Sync connection, link and event repository

use crate::error::{Error, Result};
use crate::models::{
    ConnectionId, ConnectionStatus, LinkBaseline, NewSyncEvent, NoteId, SyncConnection, SyncEvent,
    SyncEventId, SyncLink, SyncLinkId,
};
use crate::util::normalize_base_path;
use libsql::{params, Connection, Row};

use super::rows::{int, nullable_int, nullable_text, opt_int, opt_parse, opt_text, parse, text};

const CONNECTION_COLUMNS: &str = "id, user_id, repo_owner, repo_name, branch, base_path, status, \
                                  last_synced_at, created_at, updated_at";

const LINK_COLUMNS: &str = "id, connection_id, note_id, file_path, last_fingerprint, last_revision, \
                            last_commit, last_synced_note_updated_at, deleted_at, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, connection_id, direction, kind, note_id, file_path, commit_marker, \
                             status, error_message, created_at";

/// Requested repository pairing for a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    pub base_path: String,
}

/// Trait for sync bookkeeping storage (async)
#[allow(async_fn_in_trait)]
pub trait SyncRepository {
    /// Create a connection, or update branch/base path and reactivate an
    /// existing connection to the same repository
    async fn upsert_connection(
        &self,
        user_id: &str,
        target: &ConnectionTarget,
        now: i64,
    ) -> Result<SyncConnection>;

    /// Get a connection owned by `user_id`
    async fn get_connection(
        &self,
        id: &ConnectionId,
        user_id: &str,
    ) -> Result<Option<SyncConnection>>;

    /// List a user's connections
    async fn list_connections(&self, user_id: &str) -> Result<Vec<SyncConnection>>;

    /// Change lifecycle status
    async fn set_status(
        &self,
        id: &ConnectionId,
        user_id: &str,
        status: ConnectionStatus,
        now: i64,
    ) -> Result<SyncConnection>;

    /// Record pass completion time
    async fn touch_last_synced(&self, id: &ConnectionId, at: i64) -> Result<()>;

    /// Hard-delete a connection together with its links and events
    async fn delete_connection(&self, id: &ConnectionId, user_id: &str) -> Result<()>;

    /// All links of a connection (including tombstoned ones)
    async fn list_links(&self, connection_id: &ConnectionId) -> Result<Vec<SyncLink>>;

    /// Link for a note within a connection
    async fn find_link_by_note(
        &self,
        connection_id: &ConnectionId,
        note_id: &NoteId,
    ) -> Result<Option<SyncLink>>;

    /// Persist a new link
    async fn insert_link(&self, link: &SyncLink) -> Result<()>;

    /// Replace a link's baseline fields in one statement
    async fn update_link_baseline(
        &self,
        id: &SyncLinkId,
        baseline: &LinkBaseline,
        now: i64,
    ) -> Result<()>;

    /// Hard-delete a link
    async fn delete_link(&self, id: &SyncLinkId) -> Result<()>;

    /// Append an event row
    async fn insert_event(&self, event: &NewSyncEvent, now: i64) -> Result<SyncEvent>;

    /// Newest events first
    async fn list_recent_events(
        &self,
        connection_id: &ConnectionId,
        limit: usize,
    ) -> Result<Vec<SyncEvent>>;
}

/// libSQL implementation of `SyncRepository`
pub struct LibSqlSyncRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_connection(row: &Row) -> Result<SyncConnection> {
        Ok(SyncConnection {
            id: parse(&text(row, 0)?, "sync_connections.id")?,
            user_id: text(row, 1)?,
            repo_owner: text(row, 2)?,
            repo_name: text(row, 3)?,
            branch: text(row, 4)?,
            base_path: text(row, 5)?,
            status: parse(&text(row, 6)?, "sync_connections.status")?,
            last_synced_at: opt_int(row, 7)?,
            created_at: int(row, 8)?,
            updated_at: int(row, 9)?,
        })
    }

    fn parse_link(row: &Row) -> Result<SyncLink> {
        Ok(SyncLink {
            id: parse(&text(row, 0)?, "sync_links.id")?,
            connection_id: parse(&text(row, 1)?, "sync_links.connection_id")?,
            note_id: opt_parse(opt_text(row, 2)?, "sync_links.note_id")?,
            file_path: text(row, 3)?,
            last_fingerprint: text(row, 4)?,
            last_revision: opt_text(row, 5)?,
            last_commit: opt_text(row, 6)?,
            last_synced_note_updated_at: opt_int(row, 7)?,
            deleted_at: opt_int(row, 8)?,
            created_at: int(row, 9)?,
            updated_at: int(row, 10)?,
        })
    }

    fn parse_event(row: &Row) -> Result<SyncEvent> {
        Ok(SyncEvent {
            id: parse(&text(row, 0)?, "sync_events.id")?,
            connection_id: parse(&text(row, 1)?, "sync_events.connection_id")?,
            direction: parse(&text(row, 2)?, "sync_events.direction")?,
            kind: parse(&text(row, 3)?, "sync_events.kind")?,
            note_id: opt_parse(opt_text(row, 4)?, "sync_events.note_id")?,
            file_path: opt_text(row, 5)?,
            commit: opt_text(row, 6)?,
            status: parse(&text(row, 7)?, "sync_events.status")?,
            error_message: opt_text(row, 8)?,
            created_at: int(row, 9)?,
        })
    }

    async fn find_connection_by_repo(
        &self,
        user_id: &str,
        owner: &str,
        name: &str,
    ) -> Result<Option<SyncConnection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM sync_connections
             WHERE user_id = ? AND repo_owner = ? AND repo_name = ?"
        );
        let mut rows = self.conn.query(&sql, params![user_id, owner, name]).await?;
        rows.next()
            .await?
            .map(|row| Self::parse_connection(&row))
            .transpose()
    }

    async fn query_links(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<SyncLink>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut links = Vec::new();
        while let Some(row) = rows.next().await? {
            links.push(Self::parse_link(&row)?);
        }
        Ok(links)
    }
}

fn validate_target(target: &ConnectionTarget) -> Result<ConnectionTarget> {
    let repo_owner = target.repo_owner.trim();
    let repo_name = target.repo_name.trim();
    let branch = target.branch.trim();
    if repo_owner.is_empty() || repo_name.is_empty() {
        return Err(Error::InvalidInput(
            "repository owner and name are required".into(),
        ));
    }
    if branch.is_empty() {
        return Err(Error::InvalidInput("branch cannot be empty".into()));
    }
    Ok(ConnectionTarget {
        repo_owner: repo_owner.to_string(),
        repo_name: repo_name.to_string(),
        branch: branch.to_string(),
        base_path: normalize_base_path(&target.base_path),
    })
}

impl SyncRepository for LibSqlSyncRepository<'_> {
    async fn upsert_connection(
        &self,
        user_id: &str,
        target: &ConnectionTarget,
        now: i64,
    ) -> Result<SyncConnection> {
        let target = validate_target(target)?;

        if let Some(existing) = self
            .find_connection_by_repo(user_id, &target.repo_owner, &target.repo_name)
            .await?
        {
            self.conn
                .execute(
                    "UPDATE sync_connections
                     SET branch = ?, base_path = ?, status = 'active', updated_at = ?
                     WHERE id = ?",
                    params![
                        target.branch.as_str(),
                        target.base_path.as_str(),
                        now,
                        existing.id.as_str()
                    ],
                )
                .await?;
            return self
                .get_connection(&existing.id, user_id)
                .await?
                .ok_or_else(|| Error::ConnectionNotFound(existing.id.to_string()));
        }

        let connection = SyncConnection {
            id: ConnectionId::new(),
            user_id: user_id.to_string(),
            repo_owner: target.repo_owner,
            repo_name: target.repo_name,
            branch: target.branch,
            base_path: target.base_path,
            status: ConnectionStatus::Active,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO sync_connections
                 (id, user_id, repo_owner, repo_name, branch, base_path, status, last_synced_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
                params![
                    connection.id.as_str(),
                    connection.user_id.as_str(),
                    connection.repo_owner.as_str(),
                    connection.repo_name.as_str(),
                    connection.branch.as_str(),
                    connection.base_path.as_str(),
                    connection.status.as_str(),
                    connection.created_at,
                    connection.updated_at
                ],
            )
            .await?;

        Ok(connection)
    }

    async fn get_connection(
        &self,
        id: &ConnectionId,
        user_id: &str,
    ) -> Result<Option<SyncConnection>> {
        let sql =
            format!("SELECT {CONNECTION_COLUMNS} FROM sync_connections WHERE id = ? AND user_id = ?");
        let mut rows = self.conn.query(&sql, params![id.as_str(), user_id]).await?;
        rows.next()
            .await?
            .map(|row| Self::parse_connection(&row))
            .transpose()
    }

    async fn list_connections(&self, user_id: &str) -> Result<Vec<SyncConnection>> {
        let sql = format!(
            "SELECT {CONNECTION_COLUMNS} FROM sync_connections WHERE user_id = ? ORDER BY created_at"
        );
        let mut rows = self.conn.query(&sql, [user_id]).await?;
        let mut connections = Vec::new();
        while let Some(row) = rows.next().await? {
            connections.push(Self::parse_connection(&row)?);
        }
        Ok(connections)
    }

    async fn set_status(
        &self,
        id: &ConnectionId,
        user_id: &str,
        status: ConnectionStatus,
        now: i64,
    ) -> Result<SyncConnection> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_connections SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?",
                params![status.as_str(), now, id.as_str(), user_id],
            )
            .await?;
        if rows == 0 {
            return Err(Error::ConnectionNotFound(id.to_string()));
        }
        self.get_connection(id, user_id)
            .await?
            .ok_or_else(|| Error::ConnectionNotFound(id.to_string()))
    }

    async fn touch_last_synced(&self, id: &ConnectionId, at: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_connections SET last_synced_at = ?, updated_at = ? WHERE id = ?",
                params![at, at, id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn delete_connection(&self, id: &ConnectionId, user_id: &str) -> Result<()> {
        if self.get_connection(id, user_id).await?.is_none() {
            return Err(Error::ConnectionNotFound(id.to_string()));
        }

        let tx = self.conn.transaction().await?;
        tx.execute("DELETE FROM sync_events WHERE connection_id = ?", [id.as_str()])
            .await?;
        tx.execute("DELETE FROM sync_links WHERE connection_id = ?", [id.as_str()])
            .await?;
        tx.execute("DELETE FROM sync_connections WHERE id = ?", [id.as_str()])
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_links(&self, connection_id: &ConnectionId) -> Result<Vec<SyncLink>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM sync_links WHERE connection_id = ? ORDER BY file_path"
        );
        self.query_links(&sql, [connection_id.as_str()]).await
    }

    async fn find_link_by_note(
        &self,
        connection_id: &ConnectionId,
        note_id: &NoteId,
    ) -> Result<Option<SyncLink>> {
        let sql =
            format!("SELECT {LINK_COLUMNS} FROM sync_links WHERE connection_id = ? AND note_id = ?");
        Ok(self
            .query_links(&sql, params![connection_id.as_str(), note_id.as_str()])
            .await?
            .into_iter()
            .next())
    }

    async fn insert_link(&self, link: &SyncLink) -> Result<()> {
        let note_id = link.note_id.map(|id| id.as_str());
        self.conn
            .execute(
                "INSERT INTO sync_links
                 (id, connection_id, note_id, file_path, last_fingerprint, last_revision, last_commit,
                  last_synced_note_updated_at, deleted_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    link.id.as_str(),
                    link.connection_id.as_str(),
                    nullable_text(note_id.as_deref()),
                    link.file_path.as_str(),
                    link.last_fingerprint.as_str(),
                    nullable_text(link.last_revision.as_deref()),
                    nullable_text(link.last_commit.as_deref()),
                    nullable_int(link.last_synced_note_updated_at),
                    nullable_int(link.deleted_at),
                    link.created_at,
                    link.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_link_baseline(
        &self,
        id: &SyncLinkId,
        baseline: &LinkBaseline,
        now: i64,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_links
                 SET last_fingerprint = ?, last_revision = ?, last_commit = ?,
                     last_synced_note_updated_at = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    baseline.fingerprint.as_str(),
                    nullable_text(baseline.revision.as_deref()),
                    nullable_text(baseline.commit.as_deref()),
                    baseline.synced_note_updated_at,
                    now,
                    id.as_str()
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("sync link {id}")));
        }
        Ok(())
    }

    async fn delete_link(&self, id: &SyncLinkId) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_links WHERE id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn insert_event(&self, event: &NewSyncEvent, now: i64) -> Result<SyncEvent> {
        let stored = SyncEvent {
            id: SyncEventId::new(),
            connection_id: event.connection_id,
            direction: event.direction,
            kind: event.kind,
            note_id: event.note_id,
            file_path: event.file_path.clone(),
            commit: event.commit.clone(),
            status: event.status,
            error_message: event.error_message.clone(),
            created_at: now,
        };
        let note_id = stored.note_id.map(|id| id.as_str());

        self.conn
            .execute(
                "INSERT INTO sync_events
                 (id, connection_id, direction, kind, note_id, file_path, commit_marker, status, error_message, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    stored.id.as_str(),
                    stored.connection_id.as_str(),
                    stored.direction.as_str(),
                    stored.kind.as_str(),
                    nullable_text(note_id.as_deref()),
                    nullable_text(stored.file_path.as_deref()),
                    nullable_text(stored.commit.as_deref()),
                    stored.status.as_str(),
                    nullable_text(stored.error_message.as_deref()),
                    stored.created_at
                ],
            )
            .await?;

        Ok(stored)
    }

    async fn list_recent_events(
        &self,
        connection_id: &ConnectionId,
        limit: usize,
    ) -> Result<Vec<SyncEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM sync_events
             WHERE connection_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        );
        let mut rows = self
            .conn
            .query(&sql, params![connection_id.as_str(), limit])
            .await?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::parse_event(&row)?);
        }
        Ok(events)
    }
}
