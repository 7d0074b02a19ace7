//! GitHub contents API client

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::remote::{
    DeleteReceipt, EntryKind, PutReceipt, RemoteContentClient, RemoteEntry, RemoteError,
    RemoteFile, RemoteResult, WriteOutcome,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("carbon-sync/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const REPOS_PAGE_SIZE: usize = 100;

/// Authenticated GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    api_url: String,
    token: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Repository visible to the authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub full_name: String,
    pub owner: String,
    pub name: String,
    pub private: bool,
    pub default_branch: String,
}

impl GitHubClient {
    pub fn new(token: &str, api_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let token = normalize_text_option(Some(token.to_string())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("GitHub token must not be empty".to_string())
        })?;
        let api_url = normalize_api_url(api_url)?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            api_url,
            token,
            http,
        })
    }

    /// Content client bound to one repository
    pub fn repository(&self, owner: &str, name: &str) -> GitHubRepository {
        GitHubRepository {
            client: self.clone(),
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Repositories the token can see, most recently updated first.
    pub async fn list_user_repos(&self) -> RemoteResult<Vec<RepoSummary>> {
        let mut repos = Vec::new();
        let mut page = 1_usize;

        loop {
            let path = format!("/user/repos?per_page={REPOS_PAGE_SIZE}&page={page}&sort=updated");
            let response = self.request(Method::GET, &path).send().await?;
            let response = ensure_success(response).await?;
            let batch = response.json::<Vec<RepoPayload>>().await?;
            let batch_len = batch.len();

            repos.extend(batch.into_iter().map(RepoSummary::from));
            if batch_len < REPOS_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }
}

/// Contents API operations scoped to one repository
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    client: GitHubClient,
    owner: String,
    name: String,
}

impl GitHubRepository {
    fn repo_path(&self) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.name)
        )
    }

    fn contents_path(&self, path: &str, reference: Option<&str>) -> String {
        let mut url = format!("{}/contents/{}", self.repo_path(), encode_path(path));
        if let Some(reference) = reference {
            url.push_str("?ref=");
            url.push_str(&urlencoding::encode(reference));
        }
        url
    }

    /// Whether the token can read this repository
    pub async fn verify_access(&self) -> RemoteResult<bool> {
        let response = self
            .client
            .request(Method::GET, &self.repo_path())
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

impl RemoteContentClient for GitHubRepository {
    async fn list_directory(&self, path: &str, reference: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let response = self
            .client
            .request(Method::GET, &self.contents_path(path, Some(reference)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let listing = ensure_success(response).await?.json::<Listing>().await?;
        let items = match listing {
            Listing::Many(items) => items,
            Listing::One(item) => vec![item],
        };
        Ok(items.into_iter().map(RemoteEntry::from).collect())
    }

    async fn get_file(&self, path: &str, reference: &str) -> RemoteResult<Option<RemoteFile>> {
        let response = self
            .client
            .request(Method::GET, &self.contents_path(path, Some(reference)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let payload = ensure_success(response)
            .await?
            .json::<FilePayload>()
            .await?;
        Ok(Some(payload.into_remote_file(path)?))
    }

    async fn put_file(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        branch: &str,
        expected_revision: Option<&str>,
    ) -> RemoteResult<WriteOutcome<PutReceipt>> {
        let body = PutBody {
            message,
            content: BASE64.encode(bytes),
            branch,
            sha: expected_revision,
        };
        let response = self
            .client
            .request(Method::PUT, &self.contents_path(path, None))
            .json(&body)
            .send()
            .await?;

        match classify_write_status(response.status()) {
            Some(outcome) => Ok(outcome),
            None => {
                let payload = ensure_success(response)
                    .await?
                    .json::<PutPayload>()
                    .await?;
                Ok(WriteOutcome::Applied(PutReceipt {
                    revision: payload.content.sha,
                    commit: Some(payload.commit.sha),
                }))
            }
        }
    }

    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: &str,
        revision: &str,
    ) -> RemoteResult<WriteOutcome<DeleteReceipt>> {
        let body = DeleteBody {
            message,
            sha: revision,
            branch,
        };
        let response = self
            .client
            .request(Method::DELETE, &self.contents_path(path, None))
            .json(&body)
            .send()
            .await?;

        match classify_write_status(response.status()) {
            Some(outcome) => Ok(outcome),
            None => {
                let payload = ensure_success(response)
                    .await?
                    .json::<DeletePayload>()
                    .await?;
                Ok(WriteOutcome::Applied(DeleteReceipt {
                    commit: Some(payload.commit.sha),
                }))
            }
        }
    }

    async fn latest_commit(&self, branch: &str) -> RemoteResult<Option<String>> {
        let path = format!(
            "{}/commits/{}",
            self.repo_path(),
            urlencoding::encode(branch)
        );
        let response = self.client.request(Method::GET, &path).send().await?;
        if !response.status().is_success() {
            tracing::warn!(
                status = response.status().as_u16(),
                branch,
                "Could not resolve latest commit"
            );
            return Ok(None);
        }
        Ok(Some(response.json::<CommitRef>().await?.sha))
    }
}

/// Maps non-success write statuses onto outcomes; `None` means "inspect the body".
fn classify_write_status<T>(status: StatusCode) -> Option<WriteOutcome<T>> {
    match status {
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Some(WriteOutcome::RevisionMismatch)
        }
        StatusCode::NOT_FOUND => Some(WriteOutcome::NotFound),
        _ => None,
    }
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: parse_api_error(&body),
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        "request failed".to_string()
    } else {
        trimmed
    }
}

fn normalize_api_url(raw: &str) -> RemoteResult<String> {
    let api_url = normalize_text_option(Some(raw.to_string())).ok_or_else(|| {
        RemoteError::InvalidConfiguration("API URL must not be empty".to_string())
    })?;
    if is_http_url(&api_url) {
        Ok(api_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "API URL must include http:// or https://".to_string(),
        ))
    }
}

/// URL-encode each segment of a repository path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: EntryKind,
}

impl From<ContentItem> for RemoteEntry {
    fn from(item: ContentItem) -> Self {
        Self {
            name: item.name,
            path: item.path,
            revision: item.sha,
            kind: item.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Many(Vec<ContentItem>),
    One(ContentItem),
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    sha: String,
    content: Option<String>,
    encoding: Option<String>,
}

impl FilePayload {
    fn into_remote_file(self, path: &str) -> RemoteResult<RemoteFile> {
        let encoding = self.encoding.as_deref().unwrap_or("base64");
        if encoding != "base64" {
            return Err(RemoteError::InvalidPayload(format!(
                "{path}: unsupported content encoding '{encoding}'"
            )));
        }
        let content = self.content.ok_or_else(|| {
            RemoteError::InvalidPayload(format!("{path}: response did not include content"))
        })?;
        let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(cleaned)
            .map_err(|error| RemoteError::InvalidPayload(format!("{path}: {error}")))?;

        Ok(RemoteFile {
            bytes,
            revision: self.sha,
        })
    }
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutPayload {
    content: CommitRef,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct DeletePayload {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    full_name: String,
    name: String,
    owner: RepoOwner,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    default_branch: Option<String>,
}

impl From<RepoPayload> for RepoSummary {
    fn from(repo: RepoPayload) -> Self {
        Self {
            full_name: repo.full_name,
            owner: repo.owner.login,
            name: repo.name,
            private: repo.private,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
        }
    }
}
