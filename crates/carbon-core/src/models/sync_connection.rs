//! Sync connection model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::uuid_id;

uuid_id!(
    /// Identifier of a repository sync connection
    ConnectionId
);

/// Lifecycle status of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Passes may run
    #[default]
    Active,
    /// Passes are refused until resumed
    Paused,
}

impl ConnectionStatus {
    /// Database representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown connection status '{other}'")),
        }
    }
}

/// One (user, repository, branch, base directory) pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConnection {
    pub id: ConnectionId,
    pub user_id: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    /// Directory inside the repository that holds the mirrored files
    pub base_path: String,
    pub status: ConnectionStatus,
    /// Completion time of the last pass (Unix ms)
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncConnection {
    /// `owner/name` label
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }

    pub const fn is_active(&self) -> bool {
        matches!(self.status, ConnectionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [ConnectionStatus::Active, ConnectionStatus::Paused] {
            assert_eq!(status.as_str().parse::<ConnectionStatus>(), Ok(status));
        }
        assert!("archived".parse::<ConnectionStatus>().is_err());
    }
}
