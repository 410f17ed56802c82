//! Repository loader: enumerates a branch and fetches every file.
//!
//! The branch tree comes from one recursive listing. Blob entries whose
//! name matches the ignore list are dropped, the rest are fetched with
//! bounded concurrency. Files whose content cannot be decoded as text are
//! skipped with a warning.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};

use crate::config::GithubConfig;
use crate::github::{FileBody, ListingError, RepoHost, TreeEntryKind};
use crate::models::{RepositoryReference, SourceDocument};
use crate::rate_limit::{retry_on_quota, RateLimitPolicy};

pub struct RepositoryLoader<'a> {
    host: &'a dyn RepoHost,
    policy: RateLimitPolicy,
    branch: String,
    ignore: GlobSet,
    concurrency: usize,
}

impl<'a> RepositoryLoader<'a> {
    pub fn new(host: &'a dyn RepoHost, config: &GithubConfig) -> Result<Self> {
        Ok(Self {
            host,
            policy: RateLimitPolicy::from_config(config),
            branch: config.branch.clone(),
            ignore: build_ignore_set(&config.ignore_files)?,
            concurrency: config.fetch_concurrency.max(1),
        })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }

    pub async fn load_repository(
        &self,
        repo: &RepositoryReference,
    ) -> Result<Vec<SourceDocument>, ListingError> {
        let host = self.host;
        let branch = self.branch.as_str();
        let tree = retry_on_quota(&self.policy, branch, || async move {
            host.list_tree(repo, branch).await
        })
        .await?;

        if tree.truncated {
            warn!(
                repository = %repo.slug(),
                branch,
                "Tree listing was truncated by the host, some files will be missing"
            );
        }

        let paths: Vec<String> = tree
            .entries
            .into_iter()
            .filter(|e| e.kind == TreeEntryKind::Blob)
            .map(|e| e.path)
            .filter(|p| !self.is_ignored(p))
            .collect();

        info!(repository = %repo.slug(), branch, files = paths.len(), "Loading repository files");

        let loaded: Vec<Option<SourceDocument>> = stream::iter(paths)
            .map(|path| self.load_file(repo, path))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let documents: Vec<SourceDocument> = loaded.into_iter().flatten().collect();
        info!(repository = %repo.slug(), documents = documents.len(), "Repository loaded");
        Ok(documents)
    }

    async fn load_file(
        &self,
        repo: &RepositoryReference,
        path: String,
    ) -> Result<Option<SourceDocument>, ListingError> {
        let host = self.host;
        let branch = self.branch.as_str();
        let file_path = path.as_str();
        let body = retry_on_quota(&self.policy, file_path, || async move {
            host.fetch_file(repo, file_path, branch).await
        })
        .await?;

        match body {
            FileBody::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(content) => Ok(Some(SourceDocument {
                    path,
                    content,
                    repository: repo.slug(),
                })),
                Err(_) => {
                    warn!(path = %path, "Skipping file that is not valid UTF-8");
                    Ok(None)
                }
            },
            FileBody::Unavailable(reason) => {
                warn!(path = %path, reason = %reason, "Skipping file without inline content");
                Ok(None)
            }
        }
    }
}

/// Patterns without a `/` match the file name at any depth.
fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if pattern.contains('/') {
            builder.add(Glob::new(pattern)?);
        } else {
            builder.add(Glob::new(&format!("**/{}", pattern))?);
        }
    }
    Ok(builder.build()?)
}
