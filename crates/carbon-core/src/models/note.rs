//! Note model

use serde::{Deserialize, Serialize};

use super::id::uuid_id;

uuid_id!(
    /// A unique identifier for a note, using UUID v7 (time-sortable)
    NoteId
);

uuid_id!(
    /// A unique identifier for a folder
    FolderId
);

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Owning user
    pub user_id: String,
    /// Containing folder, if any
    pub folder_id: Option<FolderId>,
    /// Non-empty title
    pub title: String,
    /// Markdown body
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last modification timestamp (Unix ms)
    pub updated_at: i64,
}

impl Note {
    /// Create a new note stamped with `now_ms`
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: NoteId::new(),
            user_id: user_id.into(),
            folder_id: None,
            title: title.into(),
            content: content.into(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Get the body's first line, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
