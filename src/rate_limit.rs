//! Quota handling shared by the tree walker and the repository loader.
//!
//! Two mechanisms protect the repository host's request quota:
//!
//! - **Pre-emptive cool-down:** before a listing call, the remaining quota
//!   is read and the caller sleeps for `low_quota_cooldown` when it is
//!   below `low_watermark`.
//! - **Retry on rejection:** a call rejected with a quota error is retried
//!   after `quota_retry_cooldown`, at most `max_quota_retries` times.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::GithubConfig;
use crate::github::{ListingError, RepoHost};
use crate::models::RepositoryReference;

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub low_watermark: u64,
    pub low_quota_cooldown: Duration,
    pub quota_retry_cooldown: Duration,
    pub max_quota_retries: u32,
}

impl RateLimitPolicy {
    pub fn from_config(config: &GithubConfig) -> Self {
        Self {
            low_watermark: config.low_watermark,
            low_quota_cooldown: config.low_quota_cooldown(),
            quota_retry_cooldown: config.quota_retry_cooldown(),
            max_quota_retries: config.max_quota_retries,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_config(&GithubConfig::default())
    }
}

/// Sleep for the low-quota cool-down when fewer than `low_watermark`
/// requests remain.
pub async fn wait_for_quota(
    host: &dyn RepoHost,
    repo: &RepositoryReference,
    policy: &RateLimitPolicy,
) -> Result<(), ListingError> {
    let remaining = host.rate_limit_remaining(repo).await?;
    if remaining < policy.low_watermark {
        warn!(
            repository = %repo.slug(),
            remaining,
            cooldown_secs = policy.low_quota_cooldown.as_secs(),
            "Rate limit nearly exhausted, waiting before the next request"
        );
        tokio::time::sleep(policy.low_quota_cooldown).await;
    }
    Ok(())
}

/// Run `op`, retrying after the quota cool-down while it fails with
/// [`ListingError::QuotaExceeded`]. Any other outcome is returned as is.
pub async fn retry_on_quota<T, F, Fut>(
    policy: &RateLimitPolicy,
    target: &str,
    mut op: F,
) -> Result<T, ListingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ListingError>>,
{
    let mut retries = 0u32;
    loop {
        match op().await {
            Err(ListingError::QuotaExceeded { status }) => {
                if retries >= policy.max_quota_retries {
                    error!(
                        target_path = target,
                        status,
                        retries,
                        "Rate limit still exceeded, giving up"
                    );
                    return Err(ListingError::RetriesExhausted { attempts: retries });
                }
                retries += 1;
                warn!(
                    target_path = target,
                    status,
                    retry = retries,
                    cooldown_secs = policy.quota_retry_cooldown.as_secs(),
                    "Rate limit hit, retrying after cool-down"
                );
                tokio::time::sleep(policy.quota_retry_cooldown).await;
            }
            other => return other,
        }
    }
}
