//! Database layer for Carbon

mod connection;
mod migrations;
mod repository;
mod rows;
mod sync_repository;

pub use connection::Database;
pub use repository::{LibSqlNoteRepository, NoteRepository};
pub use sync_repository::{ConnectionTarget, LibSqlSyncRepository, SyncRepository};
