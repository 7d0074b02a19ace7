//! Sync link model: the per-note reconciliation bookkeeping

use serde::{Deserialize, Serialize};

use super::id::uuid_id;
use super::{ConnectionId, NoteId};

uuid_id!(
    /// Identifier of a sync link row
    SyncLinkId
);

/// Association between one note and one mirrored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLink {
    pub id: SyncLinkId,
    pub connection_id: ConnectionId,
    /// `None` once the note was deleted locally and the link awaits
    /// remote-deletion propagation
    pub note_id: Option<NoteId>,
    pub file_path: String,
    /// Fingerprint of the file bytes as of the last successful action
    pub last_fingerprint: String,
    /// Host revision marker of the file as of the last successful action
    pub last_revision: Option<String>,
    /// Branch commit marker as of the last successful action
    pub last_commit: Option<String>,
    /// Note modification time as of the last successful action (Unix ms)
    pub last_synced_note_updated_at: Option<i64>,
    /// Tombstone set when the note was deleted locally (Unix ms)
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncLink {
    /// True when the note side is gone and the file must be removed remotely.
    pub const fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some() || self.note_id.is_none()
    }

    /// True when the note was modified after the last successful sync.
    ///
    /// Links without a synced timestamp never report a local change.
    pub fn note_changed_since_sync(&self, note_updated_at: i64) -> bool {
        self.last_synced_note_updated_at
            .is_some_and(|synced| note_updated_at > synced)
    }
}

/// Fields of a link that move together after one successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBaseline {
    pub fingerprint: String,
    pub revision: Option<String>,
    pub commit: Option<String>,
    pub synced_note_updated_at: i64,
}
