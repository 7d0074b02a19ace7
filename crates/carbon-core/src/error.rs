//! Error types for carbon-core

use thiserror::Error;

use crate::sync::{CodecError, RemoteError};

/// Result type alias using carbon-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in carbon-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sync connection does not exist for this user
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Sync connection exists but is paused
    #[error("Connection is paused: {0}")]
    ConnectionPaused(String),

    /// No credential is available for the remote host
    #[error("Remote credential missing: {0}")]
    MissingCredential(String),

    /// Remote content host error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Mirrored file could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Remote file changed since its revision was last observed
    #[error("Remote revision changed for {0}; will retry on next sync")]
    RevisionConflict(String),
}

impl Error {
    /// Whether this error invalidates a whole sync pass rather than one item.
    pub const fn is_connection_invalid(&self) -> bool {
        matches!(
            self,
            Self::ConnectionNotFound(_) | Self::ConnectionPaused(_) | Self::MissingCredential(_)
        )
    }
}
