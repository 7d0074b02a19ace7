//! Environment-driven CLI configuration.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use carbon_core::sync::github::DEFAULT_API_URL;
use carbon_core::sync::{GitHubClient, StrategyKind};
use carbon_core::util::{is_http_url, normalize_text_option};
use thiserror::Error;

const DEFAULT_USER_ID: &str = "local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub user_id: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub http_timeout: Duration,
    pub conflict_strategy: StrategyKind,
}

impl fmt::Debug for CliConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CliConfig")
            .field("db_path", &self.db_path)
            .field("user_id", &self.user_id)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("github_api_url", &self.github_api_url)
            .field("http_timeout", &self.http_timeout)
            .field("conflict_strategy", &self.conflict_strategy)
            .finish()
    }
}

impl CliConfig {
    /// Load from the process environment; `db_path` overrides `CARBON_DB_PATH`.
    pub fn from_env(db_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned(), db_path)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        db_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let db_path = db_path
            .or_else(|| optional_trimmed(&lookup, "CARBON_DB_PATH").map(PathBuf::from))
            .or_else(default_db_path)
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "could not resolve a data directory; set CARBON_DB_PATH".to_string(),
                )
            })?;

        let user_id = value_or_default(&lookup, "CARBON_USER_ID", DEFAULT_USER_ID);
        let github_token = optional_trimmed(&lookup, "GITHUB_TOKEN");

        let github_api_url = value_or_default(&lookup, "GITHUB_API_URL", DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        if !is_http_url(&github_api_url) {
            return Err(ConfigError::Invalid(
                "GITHUB_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let timeout_secs = value_or_default(&lookup, "CARBON_HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "CARBON_HTTP_TIMEOUT_SECS must be an integer in [1, 300]".to_string(),
                )
            })?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "CARBON_HTTP_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        let conflict_strategy = value_or_default(&lookup, "CARBON_CONFLICT_STRATEGY", "local_wins")
            .parse::<StrategyKind>()
            .map_err(|error| ConfigError::Invalid(format!("CARBON_CONFLICT_STRATEGY: {error}")))?;

        Ok(Self {
            db_path,
            user_id,
            github_token,
            github_api_url,
            http_timeout: Duration::from_secs(timeout_secs),
            conflict_strategy,
        })
    }

    /// GitHub client when a token is configured
    pub fn github_client(&self) -> Result<Option<GitHubClient>, ConfigError> {
        let Some(token) = self.github_token.as_deref() else {
            return Ok(None);
        };
        GitHubClient::new(token, &self.github_api_url, self.http_timeout)
            .map(Some)
            .map_err(|error| ConfigError::Invalid(format!("GitHub client: {error}")))
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("carbon").join("carbon.db"))
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
