//! Bidirectional sync between notes and a repository of Markdown files
//!
//! A pass gathers the link table, the user's notes and the mirrored files,
//! classifies every triple (see [`classifier`]), fetches remote bodies where
//! the state depends on them, then executes one action per item.

mod actions;
pub mod classifier;
pub mod codec;
mod engine;
pub mod fingerprint;
pub mod github;
pub mod remote;
mod report;
pub mod strategy;


pub use classifier::{ChangeState, SyncItem};
pub use codec::{CodecError, DecodedNote};
pub use engine::{load_active_connection, SyncEngine, SyncMode};
pub use fingerprint::fingerprint;
pub use github::{GitHubClient, GitHubRepository, RepoSummary};
pub use remote::{
    DeleteReceipt, PutReceipt, RemoteContentClient, RemoteEntry, RemoteError, RemoteFile,
    RemoteResult, WriteOutcome,
};
pub use report::{
    ConflictCounts, DetailAction, DetailDirection, DirectionCounts, SyncDetail, SyncReport,
};
pub use strategy::{ConflictStrategy, LocalWins, RemoteWins, Resolution, StrategyKind};
