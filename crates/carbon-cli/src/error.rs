use std::io;

use carbon_core::sync::RemoteError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] carbon_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Connection not found for id/prefix/name: {0}")]
    ConnectionNotFound(String),
    #[error("{0}")]
    AmbiguousConnection(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("GITHUB_TOKEN is not set. It is required for `carbon {0}`.")]
    MissingToken(&'static str),
}
