//! Rate-limited file counting over a remote repository tree.
//!
//! The count backs the "credits" pre-check: one credit per file. Every
//! listing call is preceded by a quota check (see [`crate::rate_limit`]),
//! and quota rejections are retried after a cool-down.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::github::{EntryKind, Listing, ListingError, RepoHost};
use crate::models::RepositoryReference;
use crate::rate_limit::{retry_on_quota, wait_for_quota, RateLimitPolicy};

pub struct TreeWalker<'a> {
    host: &'a dyn RepoHost,
    policy: RateLimitPolicy,
}

impl<'a> TreeWalker<'a> {
    pub fn new(host: &'a dyn RepoHost, policy: RateLimitPolicy) -> Self {
        Self { host, policy }
    }

    /// Count the files reachable from `path`, added to `acc`.
    ///
    /// Returns `0` (not `acc`) when `path` was already visited. Paths are
    /// recorded in `visited` as they are discovered, so neither a directory
    /// nor a file is counted twice within one traversal.
    pub async fn count_files(
        &self,
        path: &str,
        repo: &RepositoryReference,
        acc: u64,
        visited: &mut HashSet<String>,
    ) -> Result<u64, ListingError> {
        if !visited.insert(path.to_string()) {
            return Ok(0);
        }

        let mut total = acc;
        let mut pending = vec![path.to_string()];

        while let Some(current) = pending.pop() {
            match self.list(repo, &current).await? {
                Listing::File(_) => total += 1,
                Listing::Directory(entries) => {
                    debug!(path = %current, entries = entries.len(), "Listed directory");
                    for entry in entries {
                        match entry.kind {
                            EntryKind::File => {
                                if visited.insert(entry.path) {
                                    total += 1;
                                }
                            }
                            EntryKind::Dir => {
                                if visited.insert(entry.path.clone()) {
                                    pending.push(entry.path);
                                }
                            }
                            EntryKind::Symlink | EntryKind::Submodule | EntryKind::Other => {}
                        }
                    }
                }
                Listing::Other => {}
            }
        }

        Ok(total)
    }

    async fn list(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<Listing, ListingError> {
        let host = self.host;
        let policy = &self.policy;
        retry_on_quota(policy, path, || async move {
            wait_for_quota(host, repo, policy).await?;
            host.list_contents(repo, path).await
        })
        .await
    }
}

/// Number of files in the repository at `github_url`, or `0` when the URL
/// does not name an owner and a repository.
pub async fn check_credits(
    host: &dyn RepoHost,
    policy: RateLimitPolicy,
    github_url: &str,
    token: Option<String>,
) -> Result<u64, ListingError> {
    let Some(repo) = RepositoryReference::parse(github_url, token) else {
        info!(url = github_url, "URL has no owner/repo, counting 0 files");
        return Ok(0);
    };

    let mut visited = HashSet::new();
    let count = TreeWalker::new(host, policy)
        .count_files("", &repo, 0, &mut visited)
        .await?;

    info!(repository = %repo.slug(), files = count, "Counted repository files");
    Ok(count)
}
