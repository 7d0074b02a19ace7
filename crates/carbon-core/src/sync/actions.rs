//! Per-state action executors
//!
//! Remote writes happen first; the note, link and event rows of one action
//! are then committed in a single transaction.

use libsql::Connection;
use tracing::debug;

use super::classifier::{ChangeState, SyncItem};
use super::codec::{decode, encode, file_name};
use super::fingerprint::fingerprint;
use super::remote::{RemoteContentClient, WriteOutcome};
use super::report::{DetailAction, DetailDirection, SyncReport};
use crate::clock::Clock;
use crate::db::{LibSqlNoteRepository, LibSqlSyncRepository, NoteRepository, SyncRepository};
use crate::error::{Error, Result};
use crate::models::{
    EventDirection, EventKind, EventStatus, LinkBaseline, NewSyncEvent, Note, NoteId,
    SyncConnection, SyncLink, SyncLinkId,
};

/// Shared state of one pass
pub(super) struct ActionContext<'a, R> {
    pub conn: &'a Connection,
    pub remote: &'a R,
    pub clock: &'a dyn Clock,
    pub connection: &'a SyncConnection,
    /// Branch head observed when the pass started
    pub commit: Option<&'a str>,
}

impl<R> ActionContext<'_, R> {
    fn done_event(
        &self,
        direction: EventDirection,
        kind: EventKind,
        note_id: Option<NoteId>,
        path: &str,
        commit: Option<&str>,
    ) -> NewSyncEvent {
        NewSyncEvent {
            connection_id: self.connection.id,
            direction,
            kind,
            note_id,
            file_path: Some(path.to_string()),
            commit: commit.map(str::to_string),
            status: EventStatus::Done,
            error_message: None,
        }
    }
}

fn required<T>(value: Option<T>, what: &str, state: ChangeState) -> Result<T> {
    value.ok_or_else(|| Error::InvalidInput(format!("{state} item is missing its {what}")))
}

/// `remote_modified`: overwrite the note with the file
pub(super) async fn pull<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let link = required(item.link.as_ref(), "link", item.state)?;
    let note = required(item.note.as_ref(), "note", item.state)?;
    let remote = required(item.remote.as_ref(), "remote body", item.state)?;
    let decoded = decode(&remote.bytes, file_name(&link.file_path))?;
    let now = ctx.clock.now_ms();

    let tx = ctx.conn.transaction().await?;
    LibSqlNoteRepository::new(&tx)
        .overwrite(&note.id, &decoded.title, &decoded.body, now)
        .await?;
    let sync = LibSqlSyncRepository::new(&tx);
    sync.update_link_baseline(
        &link.id,
        &LinkBaseline {
            fingerprint: remote.fingerprint.clone(),
            revision: Some(remote.revision.clone()),
            commit: ctx.commit.map(str::to_string),
            synced_note_updated_at: now,
        },
        now,
    )
    .await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Pull,
            EventKind::Upsert,
            Some(note.id),
            &link.file_path,
            ctx.commit,
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path = %link.file_path, note_id = %note.id, "Pulled remote change");
    report.record(
        DetailDirection::Pull,
        DetailAction::Updated,
        Some(&link.file_path),
        Some(note.id),
    );
    Ok(())
}

/// `local_modified`: overwrite the file with the note
pub(super) async fn push<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let link = required(item.link.as_ref(), "link", item.state)?;
    let note = required(item.note.as_ref(), "note", item.state)?;
    let encoded = encode(&note.id, &note.title, &note.content);
    let message = format!("sync: update {}", link.file_path);

    let outcome = ctx
        .remote
        .put_file(
            &link.file_path,
            encoded.as_bytes(),
            &message,
            &ctx.connection.branch,
            item.known_revision(),
        )
        .await?;
    let receipt = match outcome {
        WriteOutcome::Applied(receipt) => receipt,
        WriteOutcome::RevisionMismatch => {
            return Err(Error::RevisionConflict(link.file_path.clone()))
        }
        WriteOutcome::NotFound => {
            return Err(Error::NotFound(format!("remote file {}", link.file_path)))
        }
    };

    let now = ctx.clock.now_ms();
    let tx = ctx.conn.transaction().await?;
    let sync = LibSqlSyncRepository::new(&tx);
    // The note's own timestamp, so later edits still register as local changes
    sync.update_link_baseline(
        &link.id,
        &LinkBaseline {
            fingerprint: fingerprint(encoded.as_bytes()),
            revision: Some(receipt.revision),
            commit: receipt.commit.clone(),
            synced_note_updated_at: note.updated_at,
        },
        now,
    )
    .await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Push,
            EventKind::Upsert,
            Some(note.id),
            &link.file_path,
            receipt.commit.as_deref(),
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path = %link.file_path, note_id = %note.id, "Pushed local change");
    report.record(
        DetailDirection::Push,
        DetailAction::Updated,
        Some(&link.file_path),
        Some(note.id),
    );
    Ok(())
}

/// `remote_created`: create a note for a new file, or refresh the note its
/// header points back to when that note is free to be relinked
pub(super) async fn create_local<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let path = required(item.path.as_deref(), "path", item.state)?;
    let remote = required(item.remote.as_ref(), "remote body", item.state)?;
    let decoded = decode(&remote.bytes, file_name(path))?;
    let now = ctx.clock.now_ms();

    let tx = ctx.conn.transaction().await?;
    let notes = LibSqlNoteRepository::new(&tx);
    let (note_id, action) = if let Some(existing) = &item.note {
        notes
            .overwrite(&existing.id, &decoded.title, &decoded.body, now)
            .await?;
        (existing.id, DetailAction::Updated)
    } else {
        let note = notes
            .insert(&Note::new(
                ctx.connection.user_id.as_str(),
                decoded.title,
                decoded.body,
                now,
            ))
            .await?;
        (note.id, DetailAction::Created)
    };

    let sync = LibSqlSyncRepository::new(&tx);
    sync.insert_link(&SyncLink {
        id: SyncLinkId::new(),
        connection_id: ctx.connection.id,
        note_id: Some(note_id),
        file_path: path.to_string(),
        last_fingerprint: remote.fingerprint.clone(),
        last_revision: Some(remote.revision.clone()),
        last_commit: ctx.commit.map(str::to_string),
        last_synced_note_updated_at: Some(now),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    })
    .await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Pull,
            EventKind::Upsert,
            Some(note_id),
            path,
            ctx.commit,
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path, %note_id, action = action.as_str(), "Linked new remote file");
    report.record(DetailDirection::Pull, action, Some(path), Some(note_id));
    Ok(())
}

/// `local_created`: write a new file at `path` for an unlinked note
pub(super) async fn create_remote<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    path: &str,
    report: &mut SyncReport,
) -> Result<()> {
    let note = required(item.note.as_ref(), "note", item.state)?;
    let encoded = encode(&note.id, &note.title, &note.content);
    let message = format!("sync: create {path}");

    let outcome = ctx
        .remote
        .put_file(path, encoded.as_bytes(), &message, &ctx.connection.branch, None)
        .await?;
    let receipt = match outcome {
        WriteOutcome::Applied(receipt) => receipt,
        WriteOutcome::RevisionMismatch => return Err(Error::RevisionConflict(path.to_string())),
        WriteOutcome::NotFound => {
            return Err(Error::NotFound(format!(
                "branch {} for {path}",
                ctx.connection.branch
            )))
        }
    };

    let now = ctx.clock.now_ms();
    let tx = ctx.conn.transaction().await?;
    let sync = LibSqlSyncRepository::new(&tx);
    sync.insert_link(&SyncLink {
        id: SyncLinkId::new(),
        connection_id: ctx.connection.id,
        note_id: Some(note.id),
        file_path: path.to_string(),
        last_fingerprint: fingerprint(encoded.as_bytes()),
        last_revision: Some(receipt.revision),
        last_commit: receipt.commit.clone(),
        last_synced_note_updated_at: Some(note.updated_at),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    })
    .await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Push,
            EventKind::Upsert,
            Some(note.id),
            path,
            receipt.commit.as_deref(),
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path, note_id = %note.id, "Created remote file");
    report.record(
        DetailDirection::Push,
        DetailAction::Created,
        Some(path),
        Some(note.id),
    );
    Ok(())
}

/// `local_deleted`: remove the file, then the link
pub(super) async fn delete_remote<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let link = required(item.link.as_ref(), "link", item.state)?;
    let mut commit = ctx.commit.map(str::to_string);

    if let Some(revision) = item.known_revision() {
        let message = format!("sync: delete {}", link.file_path);
        let outcome = ctx
            .remote
            .delete_file(&link.file_path, &message, &ctx.connection.branch, revision)
            .await?;
        match outcome {
            WriteOutcome::Applied(receipt) => commit = receipt.commit.or(commit),
            WriteOutcome::NotFound => {
                debug!(path = %link.file_path, "Remote file already absent");
            }
            WriteOutcome::RevisionMismatch => {
                return Err(Error::RevisionConflict(link.file_path.clone()))
            }
        }
    }

    let now = ctx.clock.now_ms();
    let tx = ctx.conn.transaction().await?;
    let sync = LibSqlSyncRepository::new(&tx);
    sync.delete_link(&link.id).await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Push,
            EventKind::Delete,
            link.note_id,
            &link.file_path,
            commit.as_deref(),
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path = %link.file_path, "Deleted remote file");
    report.record(
        DetailDirection::Push,
        DetailAction::Deleted,
        Some(&link.file_path),
        link.note_id,
    );
    Ok(())
}

/// `remote_deleted`: drop the link and keep the note
pub(super) async fn unlink<R: RemoteContentClient>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let link = required(item.link.as_ref(), "link", item.state)?;
    let note_id = item.note_id();
    let now = ctx.clock.now_ms();

    let tx = ctx.conn.transaction().await?;
    let sync = LibSqlSyncRepository::new(&tx);
    sync.delete_link(&link.id).await?;
    sync.insert_event(
        &ctx.done_event(
            EventDirection::Pull,
            EventKind::Delete,
            note_id,
            &link.file_path,
            ctx.commit,
        ),
        now,
    )
    .await?;
    tx.commit().await?;

    debug!(path = %link.file_path, "Unlinked note from removed file");
    report.record(
        DetailDirection::Pull,
        DetailAction::Unlinked,
        Some(&link.file_path),
        note_id,
    );
    Ok(())
}

/// `both_modified` left for a later pass
pub(super) async fn skip_conflict<R>(
    ctx: &ActionContext<'_, R>,
    item: &SyncItem,
    report: &mut SyncReport,
) -> Result<()> {
    let path = item.path.as_deref().unwrap_or_default();
    let event = NewSyncEvent {
        status: EventStatus::Conflict,
        ..ctx.done_event(
            EventDirection::Pull,
            EventKind::Conflict,
            item.note_id(),
            path,
            ctx.commit,
        )
    };
    LibSqlSyncRepository::new(ctx.conn)
        .insert_event(&event, ctx.clock.now_ms())
        .await?;

    debug!(path, "Skipped conflict");
    report.record(
        DetailDirection::Conflict,
        DetailAction::ConflictSkipped,
        item.path.as_deref(),
        item.note_id(),
    );
    Ok(())
}

/// Count and log a failed item. Logging failures are only traced.
pub(super) async fn record_failure<R>(
    ctx: &ActionContext<'_, R>,
    direction: EventDirection,
    kind: EventKind,
    note_id: Option<NoteId>,
    path: Option<&str>,
    error: &Error,
    report: &mut SyncReport,
) {
    let message = error.to_string();
    let event = NewSyncEvent {
        connection_id: ctx.connection.id,
        direction,
        kind,
        note_id,
        file_path: path.map(str::to_string),
        commit: ctx.commit.map(str::to_string),
        status: EventStatus::Error,
        error_message: Some(message.clone()),
    };

    if let Err(log_error) = LibSqlSyncRepository::new(ctx.conn)
        .insert_event(&event, ctx.clock.now_ms())
        .await
    {
        tracing::warn!(error = %log_error, "Could not record sync error event");
    }

    report.record_error(direction.into(), path, note_id, message);
}
