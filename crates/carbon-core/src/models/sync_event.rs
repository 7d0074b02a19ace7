//! Append-only sync event log model

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::uuid_id;
use super::{ConnectionId, NoteId};

uuid_id!(
    /// Identifier of a sync event row
    SyncEventId
);

/// Which store was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDirection {
    /// Remote → local
    Pull,
    /// Local → remote
    Push,
}

/// What kind of change was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Upsert,
    Delete,
    Conflict,
}

/// Outcome of the attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Done,
    Error,
    Conflict,
}

impl EventDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
        }
    }
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::Conflict => "conflict",
        }
    }
}

impl EventStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Error => "error",
            Self::Conflict => "conflict",
        }
    }
}

impl FromStr for EventDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            other => Err(format!("unknown event direction '{other}'")),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upsert" => Ok(Self::Upsert),
            "delete" => Ok(Self::Delete),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!("unknown event kind '{other}'")),
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!("unknown event status '{other}'")),
        }
    }
}

/// Event row about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncEvent {
    pub connection_id: ConnectionId,
    pub direction: EventDirection,
    pub kind: EventKind,
    pub note_id: Option<NoteId>,
    pub file_path: Option<String>,
    pub commit: Option<String>,
    pub status: EventStatus,
    pub error_message: Option<String>,
}

/// Persisted, immutable event row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub id: SyncEventId,
    pub connection_id: ConnectionId,
    pub direction: EventDirection,
    pub kind: EventKind,
    pub note_id: Option<NoteId>,
    pub file_path: Option<String>,
    pub commit: Option<String>,
    pub status: EventStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for direction in [EventDirection::Pull, EventDirection::Push] {
            assert_eq!(direction.as_str().parse(), Ok(direction));
        }
        for kind in [EventKind::Upsert, EventKind::Delete, EventKind::Conflict] {
            assert_eq!(kind.as_str().parse(), Ok(kind));
        }
        for status in [EventStatus::Done, EventStatus::Error, EventStatus::Conflict] {
            assert_eq!(status.as_str().parse(), Ok(status));
        }
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&EventDirection::Push).unwrap();
        assert_eq!(json, "\"push\"");
    }
}
