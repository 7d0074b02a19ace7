//! Sync pass orchestration

use std::collections::HashSet;

use libsql::Connection;
use serde::Serialize;
use tracing::{info, warn};

use super::actions::{self, ActionContext};
use super::classifier::{classify, reassociate, ChangeState, FetchedFile, SyncItem};
use super::codec::{note_file_path, suffixed_path};
use super::remote::{collect_mirrored_files, RemoteContentClient};
use super::report::SyncReport;
use super::strategy::{ConflictStrategy, LocalWins, Resolution};
use crate::clock::Clock;
use crate::db::{LibSqlNoteRepository, LibSqlSyncRepository, NoteRepository, SyncRepository};
use crate::error::{Error, Result};
use crate::models::{ConnectionId, EventDirection, EventKind, SyncConnection};

/// Which item states a pass executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Execute every state
    #[default]
    Bidirectional,
    /// Only apply remote changes locally; conflicts take the remote side
    PullOnly,
}

impl SyncMode {
    pub const fn executes(self, state: ChangeState) -> bool {
        match self {
            Self::Bidirectional => true,
            Self::PullOnly => matches!(state.direction(), EventDirection::Pull),
        }
    }
}

/// Load a connection and reject it unless it is active.
pub async fn load_active_connection(
    conn: &Connection,
    id: &ConnectionId,
    user_id: &str,
) -> Result<SyncConnection> {
    let connection = LibSqlSyncRepository::new(conn)
        .get_connection(id, user_id)
        .await?
        .ok_or_else(|| Error::ConnectionNotFound(id.to_string()))?;
    if !connection.is_active() {
        return Err(Error::ConnectionPaused(connection.full_name()));
    }
    Ok(connection)
}

/// Runs reconciliation passes for one repository.
///
/// Passes over the same connection must not overlap; callers serialize them.
pub struct SyncEngine<'a, R> {
    conn: &'a Connection,
    remote: &'a R,
    clock: &'a dyn Clock,
    strategy: &'a dyn ConflictStrategy,
    mode: SyncMode,
}

impl<'a, R: RemoteContentClient> SyncEngine<'a, R> {
    pub fn new(conn: &'a Connection, remote: &'a R, clock: &'a dyn Clock) -> Self {
        Self {
            conn,
            remote,
            clock,
            strategy: &LocalWins,
            mode: SyncMode::Bidirectional,
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: &'a dyn ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run one pass over `connection`.
    ///
    /// Errors before item execution (listing the remote, reading the link
    /// table) abort the pass. Per-item failures are counted in the report.
    pub async fn run(&self, connection: &SyncConnection) -> Result<SyncReport> {
        let branch = connection.branch.as_str();
        let commit = self.remote.latest_commit(branch).await?;
        let files = collect_mirrored_files(self.remote, &connection.base_path, branch).await?;
        let links = LibSqlSyncRepository::new(self.conn)
            .list_links(&connection.id)
            .await?;
        let notes = LibSqlNoteRepository::new(self.conn)
            .list_for_user(&connection.user_id)
            .await?;

        let ctx = ActionContext {
            conn: self.conn,
            remote: self.remote,
            clock: self.clock,
            connection,
            commit: commit.as_deref(),
        };
        let mut report = SyncReport::default();
        let mut taken_paths: HashSet<String> = links
            .iter()
            .map(|link| link.file_path.clone())
            .chain(files.iter().map(|file| file.path.clone()))
            .collect();

        let mut items = Vec::new();
        for candidate in classify(&links, &notes, &files) {
            if !candidate.needs_remote() {
                items.extend(candidate.finalize(None));
                continue;
            }
            let path = candidate.path.clone().unwrap_or_default();
            match self.remote.get_file(&path, branch).await {
                Ok(file) => items.extend(candidate.finalize(file.map(FetchedFile::from))),
                Err(error) => {
                    let error = Error::from(error);
                    warn!(path = %path, %error, "Could not fetch remote file");
                    let note_id = candidate.note.as_ref().map(|note| note.id);
                    actions::record_failure(
                        &ctx,
                        EventDirection::Pull,
                        EventKind::Upsert,
                        note_id,
                        Some(&path),
                        &error,
                        &mut report,
                    )
                    .await;
                }
            }
        }

        for item in reassociate(items) {
            if !self.mode.executes(item.state) {
                continue;
            }
            let path = if item.state == ChangeState::LocalCreated {
                item.note
                    .as_ref()
                    .map(|note| allocate_path(&connection.base_path, &note.title, &mut taken_paths))
            } else {
                item.path.clone()
            };

            if let Err(error) = self
                .execute(&ctx, &item, path.as_deref(), &mut report)
                .await
            {
                warn!(state = %item.state, path = ?path, %error, "Sync item failed");
                actions::record_failure(
                    &ctx,
                    item.state.direction(),
                    item.state.event_kind(),
                    item.note_id(),
                    path.as_deref(),
                    &error,
                    &mut report,
                )
                .await;
            }
        }

        LibSqlSyncRepository::new(self.conn)
            .touch_last_synced(&connection.id, self.clock.now_ms())
            .await?;

        info!(
            connection = %connection.full_name(),
            pulled = report.pulled.total(),
            pushed = report.pushed.total(),
            conflicts_resolved = report.conflicts.resolved,
            conflicts_skipped = report.conflicts.skipped,
            errors = report.errors,
            "Sync pass finished"
        );
        Ok(report)
    }

    async fn execute(
        &self,
        ctx: &ActionContext<'_, R>,
        item: &SyncItem,
        path: Option<&str>,
        report: &mut SyncReport,
    ) -> Result<()> {
        match item.state {
            ChangeState::Unchanged => Ok(()),
            ChangeState::RemoteModified => actions::pull(ctx, item, report).await,
            ChangeState::LocalModified => actions::push(ctx, item, report).await,
            ChangeState::BothModified => self.resolve_conflict(ctx, item, report).await,
            ChangeState::RemoteCreated => actions::create_local(ctx, item, report).await,
            ChangeState::LocalCreated => {
                let path = path.ok_or_else(|| {
                    Error::InvalidInput("local_created item is missing its note".to_string())
                })?;
                actions::create_remote(ctx, item, path, report).await
            }
            ChangeState::LocalDeleted => actions::delete_remote(ctx, item, report).await,
            ChangeState::RemoteDeleted => actions::unlink(ctx, item, report).await,
        }
    }

    async fn resolve_conflict(
        &self,
        ctx: &ActionContext<'_, R>,
        item: &SyncItem,
        report: &mut SyncReport,
    ) -> Result<()> {
        let resolution = match self.mode {
            SyncMode::Bidirectional => self.strategy.resolve(item),
            SyncMode::PullOnly => Resolution::UseRemote,
        };

        match resolution {
            Resolution::UseLocal => actions::push(ctx, item, report).await?,
            Resolution::UseRemote => actions::pull(ctx, item, report).await?,
            Resolution::Skip => return actions::skip_conflict(ctx, item, report).await,
        }
        report.conflicts.resolved += 1;
        Ok(())
    }
}

/// Derive a file path for a note, suffixing `-2`, `-3`, ... on collision.
fn allocate_path(base_path: &str, title: &str, taken: &mut HashSet<String>) -> String {
    let preferred = note_file_path(base_path, title);
    let mut path = preferred.clone();
    let mut suffix = 2;
    while taken.contains(&path) {
        path = suffixed_path(&preferred, suffix);
        suffix += 1;
    }
    taken.insert(path.clone());
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_path_suffixes_collisions() {
        let mut taken = HashSet::from(["notes/Plan.md".to_string(), "notes/Plan-2.md".to_string()]);
        assert_eq!(allocate_path("notes", "Plan", &mut taken), "notes/Plan-3.md");
        assert_eq!(allocate_path("notes", "Plan", &mut taken), "notes/Plan-4.md");
        assert_eq!(allocate_path("notes", "Other", &mut taken), "notes/Other.md");
    }

    #[test]
    fn pull_only_skips_push_states() {
        assert!(SyncMode::PullOnly.executes(ChangeState::RemoteModified));
        assert!(SyncMode::PullOnly.executes(ChangeState::BothModified));
        assert!(!SyncMode::PullOnly.executes(ChangeState::LocalCreated));
        assert!(!SyncMode::PullOnly.executes(ChangeState::LocalDeleted));
        assert!(SyncMode::Bidirectional.executes(ChangeState::LocalDeleted));
    }
}
