//! `codemate credits`, `codemate index` and `codemate repair`.

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::github::GithubClient;
use crate::migrate::migrate_pool;
use crate::models::RepositoryReference;
use crate::pipeline::{index_repository, IndexContext};
use crate::progress::ProgressMode;
use crate::rate_limit::RateLimitPolicy;
use crate::store::SqliteStore;
use crate::summary;
use crate::tree_walker::check_credits;

/// `--token`, falling back to `GITHUB_TOKEN`.
pub fn resolve_token(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|t| !t.is_empty())
}

/// Print the number of files (credits) an index of `github_url` would use.
pub async fn run_credits(config: &Config, github_url: &str, token: Option<String>) -> Result<()> {
    let host = GithubClient::new(&config.github)?;
    let policy = RateLimitPolicy::from_config(&config.github);

    let files = check_credits(&host, policy, github_url, resolve_token(token))
        .await
        .with_context(|| format!("Failed to count files in {}", github_url))?;

    println!("credits");
    println!("  repository: {}", github_url);
    println!("  files: {}", files);
    Ok(())
}

pub async fn run_index(
    config: &Config,
    project_id: &str,
    github_url: &str,
    token: Option<String>,
    progress: ProgressMode,
) -> Result<()> {
    if !config.summary.is_enabled() {
        bail!("Summary provider is disabled. Set [summary] provider in config.");
    }
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let Some(repo) = RepositoryReference::parse(github_url, resolve_token(token)) else {
        bail!(
            "'{}' does not name a repository (expected https://github.com/<owner>/<repo>)",
            github_url
        );
    };

    let host = GithubClient::new(&config.github)?;
    let summarizer = summary::create_summarizer(&config.summary)?;
    let embedder = embedding::create_embedder(&config.embedding)?;
    let reporter = progress.reporter();

    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let ctx = IndexContext {
        host: &host,
        github: &config.github,
        summarizer: summarizer.as_ref(),
        embedder: embedder.as_ref(),
        store: &store,
        progress: reporter.as_ref(),
        max_concurrency: config.pipeline.max_concurrency,
    };

    let report = index_repository(&ctx, project_id, &repo).await?;

    println!("index {}", repo.slug());
    println!("  documents loaded: {}", report.documents);
    println!("  embeddings generated: {}", report.generated);
    println!("  stored: {}", report.persist.stored);
    println!("  skipped: {}", report.persist.skipped);
    println!("  failed: {}", report.persist.failed);

    pool.close().await;
    Ok(())
}

/// Delete embedding rows that never received a vector.
pub async fn run_repair(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let removed = SqliteStore::new(pool.clone()).repair_orphans().await?;

    println!("repair");
    println!("  orphaned rows removed: {}", removed);

    pool.close().await;
    Ok(())
}
