//! Repository host abstraction and the GitHub REST implementation.
//!
//! [`RepoHost`] is the seam the tree walker and the repository loader talk
//! to. [`GithubClient`] implements it against the GitHub REST API:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`rate_limit_remaining`](RepoHost::rate_limit_remaining) | `GET /rate_limit` |
//! | [`list_contents`](RepoHost::list_contents) | `GET /repos/{owner}/{repo}/contents/{path}` |
//! | [`list_tree`](RepoHost::list_tree) | `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1` |
//! | [`fetch_file`](RepoHost::fetch_file) | `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}` |
//!
//! HTTP 403 and 429 are reported as [`ListingError::QuotaExceeded`] so
//! callers can cool down and retry; every other failure is fatal.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GithubConfig;
use crate::models::RepositoryReference;
use crate::storage::uri_encode;

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("repository host quota exceeded (HTTP {status})")]
    QuotaExceeded { status: u16 },
    #[error("repository host quota still exhausted after {attempts} retries")]
    RetriesExhausted { attempts: u32 },
    #[error("{context} failed (HTTP {status}): {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },
    #[error("request to repository host failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from repository host: {0}")]
    Decode(String),
}

/// Kind of an entry in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Response of a contents listing for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    File(ContentEntry),
    Directory(Vec<ContentEntry>),
    /// Symlinks and submodules addressed directly.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    Blob,
    Tree,
    Commit,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Recursive listing of a branch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoTree {
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// File content as returned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBody {
    Bytes(Vec<u8>),
    /// The host did not inline the content; the reason is logged.
    Unavailable(String),
}

/// Remote repository hosting service.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Remaining request quota for the caller identified by `repo.token`.
    async fn rate_limit_remaining(&self, repo: &RepositoryReference) -> Result<u64, ListingError>;

    /// List a single path: a file, or a directory's direct children.
    /// The repository root is the empty path.
    async fn list_contents(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<Listing, ListingError>;

    /// Every entry reachable from `branch`.
    async fn list_tree(
        &self,
        repo: &RepositoryReference,
        branch: &str,
    ) -> Result<RepoTree, ListingError>;

    async fn fetch_file(
        &self,
        repo: &RepositoryReference,
        path: &str,
        branch: &str,
    ) -> Result<FileBody, ListingError>;
}

/// [`RepoHost`] backed by the GitHub REST API.
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("codemate-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, repo: &RepositoryReference, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url,
            uri_encode(&repo.owner),
            uri_encode(&repo.repo),
            rest
        )
    }

    fn get(&self, repo: &RepositoryReference, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &repo.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, ListingError> {
        let resp = req.send().await?;
        let status = resp.status();

        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| ListingError::Decode(format!("{}: {}", context, e)));
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ListingError::QuotaExceeded {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ListingError::Status {
            context: context.to_string(),
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        })
    }
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateStatus,
}

#[derive(Deserialize)]
struct RateStatus {
    remaining: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Directory(Vec<ContentEntry>),
    Single(ContentEntry),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileResponse {
    File(FilePayload),
    Directory(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
struct FilePayload {
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl RepoHost for GithubClient {
    async fn rate_limit_remaining(&self, repo: &RepositoryReference) -> Result<u64, ListingError> {
        let url = format!("{}/rate_limit", self.api_url);
        let resp: RateLimitResponse = self.send_json(self.get(repo, &url), "rate limit").await?;
        Ok(resp.rate.remaining)
    }

    async fn list_contents(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<Listing, ListingError> {
        let url = self.repo_url(repo, &contents_path(path));
        let context = format!("listing '{}' in {}", path, repo.slug());
        let resp: ContentsResponse = self.send_json(self.get(repo, &url), &context).await?;

        Ok(match resp {
            ContentsResponse::Directory(entries) => Listing::Directory(entries),
            ContentsResponse::Single(entry) if entry.kind == EntryKind::File => {
                Listing::File(entry)
            }
            ContentsResponse::Single(_) => Listing::Other,
        })
    }

    async fn list_tree(
        &self,
        repo: &RepositoryReference,
        branch: &str,
    ) -> Result<RepoTree, ListingError> {
        let url = self.repo_url(
            repo,
            &format!("git/trees/{}?recursive=1", uri_encode(branch)),
        );
        let context = format!("tree of {}@{}", repo.slug(), branch);
        self.send_json(self.get(repo, &url), &context).await
    }

    async fn fetch_file(
        &self,
        repo: &RepositoryReference,
        path: &str,
        branch: &str,
    ) -> Result<FileBody, ListingError> {
        let url = self.repo_url(
            repo,
            &format!("{}?ref={}", contents_path(path), uri_encode(branch)),
        );
        let context = format!("fetching '{}' from {}", path, repo.slug());
        let resp: FileResponse = self.send_json(self.get(repo, &url), &context).await?;

        match resp {
            FileResponse::Directory(_) => Ok(FileBody::Unavailable("path is a directory".into())),
            FileResponse::File(payload) => decode_file_payload(payload),
        }
    }
}

/// `contents` or `contents/<encoded path>`.
fn contents_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "contents".to_string();
    }
    let encoded = trimmed
        .split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/");
    format!("contents/{}", encoded)
}

fn decode_file_payload(payload: FilePayload) -> Result<FileBody, ListingError> {
    if payload.kind != EntryKind::File {
        return Ok(FileBody::Unavailable(format!("entry is a {:?}", payload.kind)));
    }

    match payload.encoding.as_deref() {
        Some("base64") => {
            // GitHub wraps base64 content at 60 columns.
            let compact: String = payload
                .content
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            Ok(match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
                Ok(bytes) => FileBody::Bytes(bytes),
                Err(e) => FileBody::Unavailable(format!("invalid base64 content: {}", e)),
            })
        }
        Some("none") => Ok(FileBody::Unavailable(
            "file too large for inline content".into(),
        )),
        Some(other) => Ok(FileBody::Unavailable(format!(
            "unsupported encoding '{}'",
            other
        ))),
        None => Ok(FileBody::Unavailable("no content returned".into())),
    }
}
