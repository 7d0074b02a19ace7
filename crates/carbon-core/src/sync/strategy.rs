//! Conflict resolution policies

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::classifier::SyncItem;

/// What to do with an item changed on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    UseLocal,
    UseRemote,
    /// Leave both sides untouched until the next pass
    Skip,
}

/// Policy consulted for `both_modified` items
pub trait ConflictStrategy: Send + Sync {
    fn resolve(&self, item: &SyncItem) -> Resolution;
}

/// The note overwrites the file
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWins;

impl ConflictStrategy for LocalWins {
    fn resolve(&self, _item: &SyncItem) -> Resolution {
        Resolution::UseLocal
    }
}

/// The file overwrites the note
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteWins;

impl ConflictStrategy for RemoteWins {
    fn resolve(&self, _item: &SyncItem) -> Resolution {
        Resolution::UseRemote
    }
}

/// Named built-in strategy, as configured or passed on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    LocalWins,
    RemoteWins,
}

impl StrategyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalWins => "local_wins",
            Self::RemoteWins => "remote_wins",
        }
    }

    pub fn strategy(self) -> &'static dyn ConflictStrategy {
        match self {
            Self::LocalWins => &LocalWins,
            Self::RemoteWins => &RemoteWins,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_wins" | "local" => Ok(Self::LocalWins),
            "remote_wins" | "remote" => Ok(Self::RemoteWins),
            other => Err(format!(
                "unknown conflict strategy '{other}' (expected local_wins or remote_wins)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::classifier::ChangeState;

    fn conflict() -> SyncItem {
        SyncItem {
            state: ChangeState::BothModified,
            link: None,
            note: None,
            path: Some("a.md".to_string()),
            listed_revision: None,
            remote: None,
        }
    }

    #[test]
    fn built_in_strategies_are_constant() {
        assert_eq!(LocalWins.resolve(&conflict()), Resolution::UseLocal);
        assert_eq!(RemoteWins.resolve(&conflict()), Resolution::UseRemote);
    }

    #[test]
    fn strategy_kind_parses_both_spellings() {
        assert_eq!("local-wins".parse(), Ok(StrategyKind::LocalWins));
        assert_eq!("REMOTE_WINS".parse(), Ok(StrategyKind::RemoteWins));
        assert!("newest".parse::<StrategyKind>().is_err());
        assert_eq!(
            StrategyKind::RemoteWins.strategy().resolve(&conflict()),
            Resolution::UseRemote
        );
    }
}
