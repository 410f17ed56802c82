//! TOML configuration parsing and validation.
//!
//! Secrets never live in the file: API keys and storage credentials are read
//! from the environment by the clients that need them.
//!
//! ```toml
//! [db]
//! path = "./data/codemate.sqlite"
//!
//! [github]
//! branch = "main"
//!
//! [summary]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//!
//! [embedding]
//! provider = "gemini"
//! model = "text-embedding-004"
//! dims = 768
//!
//! [storage]
//! endpoint_url = "https://example.supabase.co/storage/v1/s3"
//! public_base_url = "https://example.supabase.co/storage/v1/object/public/codemate"
//!
//! [meetings]
//! process_url = "http://localhost:3000/api/process-meeting"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub meetings: MeetingsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Repository host settings, including the rate-limit policy used by the
/// tree walker and the repository loader.
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Remaining-quota level below which a listing call waits first.
    #[serde(default = "default_low_watermark")]
    pub low_watermark: u64,
    #[serde(default = "default_low_quota_cooldown_secs")]
    pub low_quota_cooldown_secs: u64,
    #[serde(default = "default_quota_retry_cooldown_secs")]
    pub quota_retry_cooldown_secs: u64,
    #[serde(default = "default_max_quota_retries")]
    pub max_quota_retries: u32,
    /// Simultaneous content fetches while loading a repository.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_ignore_files")]
    pub ignore_files: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            branch: default_branch(),
            low_watermark: default_low_watermark(),
            low_quota_cooldown_secs: default_low_quota_cooldown_secs(),
            quota_retry_cooldown_secs: default_quota_retry_cooldown_secs(),
            max_quota_retries: default_max_quota_retries(),
            fetch_concurrency: default_fetch_concurrency(),
            ignore_files: default_ignore_files(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_low_watermark() -> u64 {
    5
}
fn default_low_quota_cooldown_secs() -> u64 {
    60
}
fn default_quota_retry_cooldown_secs() -> u64 {
    30
}
fn default_max_quota_retries() -> u32 {
    10
}
fn default_fetch_concurrency() -> usize {
    5
}
fn default_ignore_files() -> Vec<String> {
    vec![
        "package-lock.json".to_string(),
        "yarn.lock".to_string(),
        "pnpm-lock.yaml".to_string(),
        "bun.lockb".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummaryConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Source text beyond this many characters is cut before summarising.
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            max_source_chars: default_max_source_chars(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_max_source_chars() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Documents summarised and embedded at the same time.
    #[serde(default = "default_pipeline_concurrency")]
    pub max_concurrency: usize,
    /// Minimum cosine similarity for a search hit.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_pipeline_concurrency(),
            min_similarity: default_min_similarity(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_pipeline_concurrency() -> usize {
    16
}
fn default_min_similarity() -> f32 {
    0.5
}
fn default_search_limit() -> usize {
    10
}

/// S3-compatible object storage used for meeting uploads.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (Supabase S3, MinIO, LocalStack). Requests are
    /// path-style when set.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Base for public object addresses; `<base>/<key>`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint_url: None,
            public_base_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_bucket() -> String {
    "codemate".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_key_prefix() -> String {
    "meetings".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MeetingsConfig {
    /// Endpoint receiving `{meetingUrl, meetingId, projectId}` after upload.
    #[serde(default)]
    pub process_url: Option<String>,
}

impl GithubConfig {
    pub fn low_quota_cooldown(&self) -> Duration {
        Duration::from_secs(self.low_quota_cooldown_secs)
    }

    pub fn quota_retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.quota_retry_cooldown_secs)
    }
}

impl SummaryConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Configuration with every section at its default, backed by the given
    /// database path.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            github: GithubConfig::default(),
            summary: SummaryConfig::default(),
            embedding: EmbeddingConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            meetings: MeetingsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.github.fetch_concurrency == 0 {
        anyhow::bail!("github.fetch_concurrency must be > 0");
    }
    if config.pipeline.max_concurrency == 0 {
        anyhow::bail!("pipeline.max_concurrency must be > 0");
    }
    if !(-1.0..=1.0).contains(&config.pipeline.min_similarity) {
        anyhow::bail!("pipeline.min_similarity must be in [-1.0, 1.0]");
    }

    match config.summary.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown summary provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, gemini, or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.storage.bucket.trim().is_empty() {
        anyhow::bail!("storage.bucket must not be empty");
    }

    Ok(())
}
