//! Change classification
//!
//! Classification runs in two phases. [`classify`] works from the link table,
//! the user's notes and the remote listing alone, producing [`Candidate`]s
//! whose state is either settled or waits on the remote file body. Once
//! bodies are fetched, [`Candidate::finalize`] turns each candidate into an
//! immutable [`SyncItem`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::codec::{decode, file_name};
use super::fingerprint::fingerprint;
use super::remote::{RemoteEntry, RemoteFile};
use crate::models::{EventDirection, EventKind, Note, NoteId, SyncLink};

/// Per-item reconciliation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeState {
    Unchanged,
    LocalModified,
    RemoteModified,
    BothModified,
    RemoteCreated,
    LocalCreated,
    LocalDeleted,
    RemoteDeleted,
}

impl ChangeState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::LocalModified => "local_modified",
            Self::RemoteModified => "remote_modified",
            Self::BothModified => "both_modified",
            Self::RemoteCreated => "remote_created",
            Self::LocalCreated => "local_created",
            Self::LocalDeleted => "local_deleted",
            Self::RemoteDeleted => "remote_deleted",
        }
    }

    /// Direction recorded for this state's events
    pub const fn direction(self) -> EventDirection {
        match self {
            Self::LocalModified | Self::LocalCreated | Self::LocalDeleted => EventDirection::Push,
            _ => EventDirection::Pull,
        }
    }

    /// Kind recorded for this state's events
    pub const fn event_kind(self) -> EventKind {
        match self {
            Self::LocalDeleted | Self::RemoteDeleted => EventKind::Delete,
            _ => EventKind::Upsert,
        }
    }
}

impl std::fmt::Display for ChangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase-one state of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisional {
    Settled(ChangeState),
    /// Linked note and file both exist; the remote side is undecided until
    /// the body is fingerprinted
    PendingRemoteCheck { local_changed: bool },
}

/// Remote file fetched during this pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    pub revision: String,
    pub fingerprint: String,
}

impl From<RemoteFile> for FetchedFile {
    fn from(file: RemoteFile) -> Self {
        Self {
            fingerprint: fingerprint(&file.bytes),
            bytes: file.bytes,
            revision: file.revision,
        }
    }
}

/// Phase-one classification of one note/file/link triple
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provisional: Provisional,
    pub link: Option<SyncLink>,
    pub note: Option<Note>,
    pub path: Option<String>,
    /// Revision reported by the directory listing
    pub listed_revision: Option<String>,
}

/// Final classification of one triple
#[derive(Debug, Clone)]
pub struct SyncItem {
    pub state: ChangeState,
    pub link: Option<SyncLink>,
    pub note: Option<Note>,
    pub path: Option<String>,
    pub listed_revision: Option<String>,
    pub remote: Option<FetchedFile>,
}

impl SyncItem {
    pub fn note_id(&self) -> Option<NoteId> {
        self.note
            .as_ref()
            .map(|note| note.id)
            .or_else(|| self.link.as_ref().and_then(|link| link.note_id))
    }

    /// Revision to present when overwriting or deleting the remote file
    pub fn known_revision(&self) -> Option<&str> {
        self.remote
            .as_ref()
            .map(|remote| remote.revision.as_str())
            .or(self.listed_revision.as_deref())
            .or_else(|| {
                self.link
                    .as_ref()
                    .and_then(|link| link.last_revision.as_deref())
            })
    }
}

impl Candidate {
    /// Whether the remote body must be fetched before the state is final
    pub const fn needs_remote(&self) -> bool {
        matches!(
            self.provisional,
            Provisional::PendingRemoteCheck { .. }
                | Provisional::Settled(ChangeState::RemoteCreated)
        )
    }

    /// Resolve the final state. `fetched` is the remote body for candidates
    /// that need one; `None` means the file vanished after listing.
    /// Vanished `remote_created` files yield no item.
    pub fn finalize(self, fetched: Option<FetchedFile>) -> Option<SyncItem> {
        let state = match (self.provisional, &fetched) {
            (Provisional::PendingRemoteCheck { .. }, None) => ChangeState::RemoteDeleted,
            (Provisional::PendingRemoteCheck { local_changed }, Some(remote)) => {
                let remote_changed = !matches!(
                    &self.link,
                    Some(link) if link.last_fingerprint == remote.fingerprint
                );
                match (local_changed, remote_changed) {
                    (true, true) => ChangeState::BothModified,
                    (true, false) => ChangeState::LocalModified,
                    (false, true) => ChangeState::RemoteModified,
                    (false, false) => ChangeState::Unchanged,
                }
            }
            (Provisional::Settled(ChangeState::RemoteCreated), None) => return None,
            (Provisional::Settled(state), _) => state,
        };

        Some(SyncItem {
            state,
            link: self.link,
            note: self.note,
            path: self.path,
            listed_revision: self.listed_revision,
            remote: fetched,
        })
    }
}

/// Phase one: classify every link, unlinked file and unlinked note.
///
/// Linked items come first in link order, then new remote files in listing
/// order, then new notes oldest first.
pub fn classify(links: &[SyncLink], notes: &[Note], files: &[RemoteEntry]) -> Vec<Candidate> {
    let note_by_id: HashMap<NoteId, &Note> = notes.iter().map(|note| (note.id, note)).collect();
    let file_by_path: HashMap<&str, &RemoteEntry> =
        files.iter().map(|file| (file.path.as_str(), file)).collect();

    let mut linked_paths = HashSet::new();
    let mut linked_notes = HashSet::new();
    let mut candidates = Vec::new();

    for link in links {
        linked_paths.insert(link.file_path.as_str());
        if let Some(note_id) = link.note_id {
            linked_notes.insert(note_id);
        }

        let remote = file_by_path.get(link.file_path.as_str());
        let note = link
            .note_id
            .and_then(|note_id| note_by_id.get(&note_id).copied());

        let provisional = match (link.is_tombstoned(), note, remote) {
            (true, _, _) | (false, None, _) => Provisional::Settled(ChangeState::LocalDeleted),
            (false, Some(_), None) => Provisional::Settled(ChangeState::RemoteDeleted),
            (false, Some(note), Some(_)) => Provisional::PendingRemoteCheck {
                local_changed: link.note_changed_since_sync(note.updated_at),
            },
        };

        candidates.push(Candidate {
            provisional,
            link: Some(link.clone()),
            note: note.cloned(),
            path: Some(link.file_path.clone()),
            listed_revision: remote.map(|file| file.revision.clone()),
        });
    }

    for file in files {
        if !linked_paths.insert(file.path.as_str()) {
            continue;
        }
        candidates.push(Candidate {
            provisional: Provisional::Settled(ChangeState::RemoteCreated),
            link: None,
            note: None,
            path: Some(file.path.clone()),
            listed_revision: Some(file.revision.clone()),
        });
    }

    let mut unlinked: Vec<&Note> = notes
        .iter()
        .filter(|note| !linked_notes.contains(&note.id))
        .collect();
    unlinked.sort_by_key(|note| (note.created_at, note.id));
    for note in unlinked {
        candidates.push(Candidate {
            provisional: Provisional::Settled(ChangeState::LocalCreated),
            link: None,
            note: Some(note.clone()),
            path: None,
            listed_revision: None,
        });
    }

    candidates
}

/// Pair new remote files with the notes their header names.
///
/// A header can claim an unlinked note, whose `local_created` item is then
/// dropped, or a note whose file vanished this pass. The latter is a rename:
/// its `remote_deleted` item still runs first and removes the old link, and
/// the `remote_created` item relinks the same note at the new path.
pub fn reassociate(items: Vec<SyncItem>) -> Vec<SyncItem> {
    let mut claimable: HashMap<NoteId, Note> = HashMap::new();
    for item in &items {
        if matches!(
            item.state,
            ChangeState::LocalCreated | ChangeState::RemoteDeleted
        ) {
            if let Some(note) = &item.note {
                claimable.insert(note.id, note.clone());
            }
        }
    }

    // path of the remote_created item -> note it claims
    let mut claims: HashMap<String, NoteId> = HashMap::new();
    let mut claimed = HashSet::new();
    for item in &items {
        if item.state != ChangeState::RemoteCreated {
            continue;
        }
        let (Some(path), Some(note_id)) = (&item.path, cross_ref_of(item)) else {
            continue;
        };
        if claimable.contains_key(&note_id) && claimed.insert(note_id) {
            claims.insert(path.clone(), note_id);
        }
    }

    if claims.is_empty() {
        return items;
    }

    let mut kept = Vec::with_capacity(items.len());
    for mut item in items {
        match item.state {
            ChangeState::LocalCreated
                if item.note_id().is_some_and(|id| claimed.contains(&id)) =>
            {
                continue;
            }
            ChangeState::RemoteCreated => {
                if let Some(note_id) = item.path.as_ref().and_then(|path| claims.get(path)) {
                    item.note = claimable.remove(note_id);
                }
            }
            _ => {}
        }
        kept.push(item);
    }

    kept
}

fn cross_ref_of(item: &SyncItem) -> Option<NoteId> {
    let remote = item.remote.as_ref()?;
    let path = item.path.as_deref()?;
    decode(&remote.bytes, file_name(path)).ok()?.cross_ref
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionId, SyncLinkId};
    use crate::sync::codec::encode;
    use crate::sync::remote::EntryKind;

    fn note(title: &str, created_at: i64, updated_at: i64) -> Note {
        Note {
            updated_at,
            ..Note::new("u1", title, "body", created_at)
        }
    }

    fn entry(path: &str, revision: &str) -> RemoteEntry {
        RemoteEntry {
            name: file_name(path).to_string(),
            path: path.to_string(),
            revision: revision.to_string(),
            kind: EntryKind::File,
        }
    }

    fn link(note: Option<&Note>, path: &str, synced: Option<i64>) -> SyncLink {
        SyncLink {
            id: SyncLinkId::new(),
            connection_id: ConnectionId::new(),
            note_id: note.map(|note| note.id),
            file_path: path.to_string(),
            last_fingerprint: fingerprint(b"baseline"),
            last_revision: Some("rev-0".to_string()),
            last_commit: None,
            last_synced_note_updated_at: synced,
            deleted_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn fetched(bytes: &[u8], revision: &str) -> FetchedFile {
        FetchedFile::from(RemoteFile {
            bytes: bytes.to_vec(),
            revision: revision.to_string(),
        })
    }

    fn states(candidates: &[Candidate]) -> Vec<Provisional> {
        candidates.iter().map(|c| c.provisional).collect()
    }

    #[test]
    fn classify_covers_every_triple() {
        let linked = note("Linked", 1, 5);
        let orphan_link_note = note("Gone remote", 2, 2);
        let fresh = note("Fresh", 3, 3);
        let mut tombstone = link(None, "notes/deleted.md", Some(1));
        tombstone.deleted_at = Some(9);

        let links = vec![
            link(Some(&linked), "notes/linked.md", Some(4)),
            link(Some(&orphan_link_note), "notes/gone.md", Some(2)),
            tombstone,
        ];
        let notes = vec![fresh.clone(), linked, orphan_link_note];
        let files = vec![
            entry("notes/linked.md", "r1"),
            entry("notes/deleted.md", "r2"),
            entry("notes/new.md", "r3"),
        ];

        let candidates = classify(&links, &notes, &files);
        assert_eq!(
            states(&candidates),
            vec![
                Provisional::PendingRemoteCheck {
                    local_changed: true
                },
                Provisional::Settled(ChangeState::RemoteDeleted),
                Provisional::Settled(ChangeState::LocalDeleted),
                Provisional::Settled(ChangeState::RemoteCreated),
                Provisional::Settled(ChangeState::LocalCreated),
            ]
        );
        assert_eq!(candidates[2].listed_revision.as_deref(), Some("r2"));
        assert_eq!(candidates[4].note.as_ref().map(|n| n.id), Some(fresh.id));
    }

    #[test]
    fn link_to_missing_note_is_local_deleted() {
        let missing = note("Missing", 1, 1);
        let links = vec![link(Some(&missing), "a.md", Some(1))];
        let candidates = classify(&links, &[], &[entry("a.md", "r")]);
        assert_eq!(
            states(&candidates),
            vec![Provisional::Settled(ChangeState::LocalDeleted)]
        );
    }

    #[test]
    fn null_synced_timestamp_never_reports_local_change() {
        let edited = note("Edited", 1, 500);
        let links = vec![link(Some(&edited), "a.md", None)];
        let candidates = classify(&links, &[edited], &[entry("a.md", "r")]);
        assert_eq!(
            states(&candidates),
            vec![Provisional::PendingRemoteCheck {
                local_changed: false
            }]
        );
    }

    #[test]
    fn finalize_combines_local_and_remote_deltas() {
        let n = note("N", 1, 1);
        let base = link(Some(&n), "a.md", Some(1));
        let candidate = |local_changed| Candidate {
            provisional: Provisional::PendingRemoteCheck { local_changed },
            link: Some(base.clone()),
            note: Some(n.clone()),
            path: Some("a.md".to_string()),
            listed_revision: Some("r".to_string()),
        };

        let same = || Some(fetched(b"baseline", "r"));
        let changed = || Some(fetched(b"edited", "r2"));

        let state = |c: Candidate, f| c.finalize(f).map(|item| item.state);
        assert_eq!(state(candidate(false), same()), Some(ChangeState::Unchanged));
        assert_eq!(state(candidate(true), same()), Some(ChangeState::LocalModified));
        assert_eq!(state(candidate(false), changed()), Some(ChangeState::RemoteModified));
        assert_eq!(state(candidate(true), changed()), Some(ChangeState::BothModified));
        assert_eq!(state(candidate(true), None), Some(ChangeState::RemoteDeleted));
    }

    #[test]
    fn vanished_remote_created_file_is_dropped() {
        let candidate = Candidate {
            provisional: Provisional::Settled(ChangeState::RemoteCreated),
            link: None,
            note: None,
            path: Some("a.md".to_string()),
            listed_revision: Some("r".to_string()),
        };
        assert!(candidate.needs_remote());
        assert!(candidate.finalize(None).is_none());
    }

    #[test]
    fn reassociate_absorbs_unlinked_note_named_by_header() {
        let orphan = note("Orphan", 1, 1);
        let bytes = encode(&orphan.id, "Orphan", "body");
        let items = vec![
            SyncItem {
                state: ChangeState::RemoteCreated,
                link: None,
                note: None,
                path: Some("notes/Orphan.md".to_string()),
                listed_revision: Some("r".to_string()),
                remote: Some(fetched(bytes.as_bytes(), "r")),
            },
            SyncItem {
                state: ChangeState::LocalCreated,
                link: None,
                note: Some(orphan.clone()),
                path: None,
                listed_revision: None,
                remote: None,
            },
        ];

        let items = reassociate(items);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].state, ChangeState::RemoteCreated);
        assert_eq!(items[0].note_id(), Some(orphan.id));
    }

    #[test]
    fn reassociate_claims_note_released_by_remote_delete() {
        let moved = note("Moved", 1, 1);
        let old_link = link(Some(&moved), "notes/old.md", Some(1));
        let bytes = encode(&moved.id, "Moved", "body");
        let items = vec![
            SyncItem {
                state: ChangeState::RemoteDeleted,
                link: Some(old_link.clone()),
                note: Some(moved.clone()),
                path: Some("notes/old.md".to_string()),
                listed_revision: None,
                remote: None,
            },
            SyncItem {
                state: ChangeState::RemoteCreated,
                link: None,
                note: None,
                path: Some("notes/new.md".to_string()),
                listed_revision: Some("r".to_string()),
                remote: Some(fetched(bytes.as_bytes(), "r")),
            },
        ];

        let items = reassociate(items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].state, ChangeState::RemoteDeleted);
        assert_eq!(items[0].link.as_ref().map(|l| l.id), Some(old_link.id));
        assert_eq!(items[1].state, ChangeState::RemoteCreated);
        assert_eq!(items[1].note_id(), Some(moved.id));
    }

    #[test]
    fn reassociate_ignores_header_of_linked_note() {
        let linked = note("Linked", 1, 1);
        let bytes = encode(&linked.id, "Linked", "copy");
        let items = vec![SyncItem {
            state: ChangeState::RemoteCreated,
            link: None,
            note: None,
            path: Some("copy.md".to_string()),
            listed_revision: None,
            remote: Some(fetched(bytes.as_bytes(), "r")),
        }];

        let items = reassociate(items);
        assert_eq!(items.len(), 1);
        assert!(items[0].note.is_none());
    }

    #[test]
    fn event_mapping_follows_state() {
        assert_eq!(ChangeState::LocalCreated.direction(), EventDirection::Push);
        assert_eq!(ChangeState::BothModified.direction(), EventDirection::Pull);
        assert_eq!(ChangeState::RemoteDeleted.event_kind(), EventKind::Delete);
        assert_eq!(ChangeState::LocalModified.event_kind(), EventKind::Upsert);
    }
}
