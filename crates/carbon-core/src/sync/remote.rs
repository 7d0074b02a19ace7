//! Remote content host abstraction

use serde::Deserialize;
use thiserror::Error;

use super::codec::is_mirrored_file;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub revision: String,
    pub kind: EntryKind,
}

/// File content together with its revision marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub bytes: Vec<u8>,
    pub revision: String,
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub revision: String,
    pub commit: Option<String>,
}

/// Result of a successful delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReceipt {
    pub commit: Option<String>,
}

/// Outcome of a revision-checked write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Applied(T),
    /// The file changed since the supplied revision was observed
    RevisionMismatch,
    /// The file (or its parent ref) does not exist
    NotFound,
}

/// Content operations on one branch-addressable repository
#[allow(async_fn_in_trait)]
pub trait RemoteContentClient {
    /// List a directory. A missing directory yields an empty list.
    async fn list_directory(&self, path: &str, reference: &str) -> RemoteResult<Vec<RemoteEntry>>;

    /// Fetch a file, `None` when absent
    async fn get_file(&self, path: &str, reference: &str) -> RemoteResult<Option<RemoteFile>>;

    /// Create (`expected_revision == None`) or replace a file
    async fn put_file(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        branch: &str,
        expected_revision: Option<&str>,
    ) -> RemoteResult<WriteOutcome<PutReceipt>>;

    /// Delete a file at a known revision
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: &str,
        revision: &str,
    ) -> RemoteResult<WriteOutcome<DeleteReceipt>>;

    /// Head commit of a branch
    async fn latest_commit(&self, branch: &str) -> RemoteResult<Option<String>>;
}

/// Walk `base_path` recursively and return every mirrored file.
pub async fn collect_mirrored_files<C: RemoteContentClient>(
    client: &C,
    base_path: &str,
    reference: &str,
) -> RemoteResult<Vec<RemoteEntry>> {
    let mut files = Vec::new();
    let mut pending = vec![base_path.to_string()];

    while let Some(dir) = pending.pop() {
        let mut subdirs = Vec::new();
        for entry in client.list_directory(&dir, reference).await? {
            match entry.kind {
                EntryKind::File if is_mirrored_file(&entry.name) => files.push(entry),
                EntryKind::Dir => subdirs.push(entry.path),
                _ => {}
            }
        }
        // Visit subdirectories in listing order
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(files)
}
