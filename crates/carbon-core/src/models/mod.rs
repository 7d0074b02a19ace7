//! Data models for Carbon

mod id;
mod note;
mod sync_connection;
mod sync_event;
mod sync_link;

pub use note::{FolderId, Note, NoteId};
pub use sync_connection::{ConnectionId, ConnectionStatus, SyncConnection};
pub use sync_event::{EventDirection, EventKind, EventStatus, NewSyncEvent, SyncEvent, SyncEventId};
pub use sync_link::{LinkBaseline, SyncLink, SyncLinkId};
