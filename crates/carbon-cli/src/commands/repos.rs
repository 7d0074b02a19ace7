use carbon_core::sync::RepoSummary;

use crate::commands::common::require_github_client;
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_repos(as_json: bool, config: &CliConfig) -> Result<(), CliError> {
    let client = require_github_client(config, "repos")?;
    let repos = client.list_user_repos().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }

    for line in format_repo_lines(&repos) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_repo_lines(repos: &[RepoSummary]) -> Vec<String> {
    repos
        .iter()
        .map(|repo| {
            let visibility = if repo.private { "private" } else { "public" };
            format!(
                "{:<40}  {:<7}  {}",
                repo.full_name, visibility, repo.default_branch
            )
        })
        .collect()
}
