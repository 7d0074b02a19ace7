//! Structured result of a sync pass

use serde::Serialize;

use crate::models::{EventDirection, NoteId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl DirectionCounts {
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConflictCounts {
    pub resolved: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailDirection {
    Pull,
    Push,
    Conflict,
}

impl From<EventDirection> for DetailDirection {
    fn from(direction: EventDirection) -> Self {
        match direction {
            EventDirection::Pull => Self::Pull,
            EventDirection::Push => Self::Push,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailAction {
    Created,
    Updated,
    Deleted,
    /// Remote file gone; link removed, note kept
    Unlinked,
    ConflictSkipped,
    Error,
}

impl DetailDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Conflict => "conflict",
        }
    }
}

impl DetailAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Unlinked => "unlinked",
            Self::ConflictSkipped => "conflict_skipped",
            Self::Error => "error",
        }
    }
}

/// One executed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncDetail {
    pub direction: DetailDirection,
    pub action: DetailAction,
    pub path: Option<String>,
    pub note_id: Option<NoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts and per-item details of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pulled: DirectionCounts,
    pub pushed: DirectionCounts,
    pub conflicts: ConflictCounts,
    pub errors: usize,
    pub details: Vec<SyncDetail>,
}

impl SyncReport {
    pub(crate) fn record(
        &mut self,
        direction: DetailDirection,
        action: DetailAction,
        path: Option<&str>,
        note_id: Option<NoteId>,
    ) {
        let counts = match direction {
            DetailDirection::Pull => Some(&mut self.pulled),
            DetailDirection::Push => Some(&mut self.pushed),
            DetailDirection::Conflict => None,
        };
        if let Some(counts) = counts {
            match action {
                DetailAction::Created => counts.created += 1,
                DetailAction::Updated => counts.updated += 1,
                DetailAction::Deleted | DetailAction::Unlinked => counts.deleted += 1,
                DetailAction::ConflictSkipped | DetailAction::Error => {}
            }
        }
        if action == DetailAction::ConflictSkipped {
            self.conflicts.skipped += 1;
        }

        self.details.push(SyncDetail {
            direction,
            action,
            path: path.map(str::to_string),
            note_id,
            error: None,
        });
    }

    pub(crate) fn record_error(
        &mut self,
        direction: DetailDirection,
        path: Option<&str>,
        note_id: Option<NoteId>,
        message: String,
    ) {
        self.errors += 1;
        self.details.push(SyncDetail {
            direction,
            action: DetailAction::Error,
            path: path.map(str::to_string),
            note_id,
            error: Some(message),
        });
    }

    /// Number of writes applied to either side
    pub const fn total_changes(&self) -> usize {
        self.pulled.total() + self.pushed.total()
    }
}
