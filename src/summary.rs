//! Source-file summaries from a generative model.
//!
//! The summary, not the raw code, is what gets embedded: questions are
//! phrased in prose, so prose vectors rank better against them.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::SummaryConfig;
use crate::embedding::{post_json_with_retry, GEMINI_API_URL};
use crate::models::SourceDocument;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Produces a short natural-language summary of one source file.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarise(&self, doc: &SourceDocument) -> Result<String>;
}

/// Prompt for one file. Code past `max_chars` characters is cut.
pub fn build_prompt(file_name: &str, code: &str, max_chars: usize) -> String {
    let code: String = code.chars().take(max_chars).collect();
    format!(
        "You are a senior software engineer who onboards junior engineers onto projects.\n\
         Explain the purpose of the file `{file_name}` to a junior engineer joining the project.\n\
         \n\
         Here is the code:\n\
         ---\n\
         {code}\n\
         ---\n\
         \n\
         Give a summary of no more than 100 words of the code above."
    )
}

pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarise(&self, _doc: &SourceDocument) -> Result<String> {
        bail!("Summary provider is disabled")
    }
}

pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_source_chars: usize,
    max_retries: u32,
}

impl GeminiSummarizer {
    /// Reads `GEMINI_API_KEY` from the environment.
    pub fn new(config: &SummaryConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &SummaryConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            max_source_chars: config.max_source_chars,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarise(&self, doc: &SourceDocument) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let prompt = build_prompt(&doc.path, &doc.content, self.max_source_chars);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        let json = post_json_with_retry(
            &self.client,
            &url,
            &[("x-goog-api-key", self.api_key.as_str())],
            &body,
            self.max_retries,
            "Gemini",
        )
        .await?;

        parse_generated_text(&json)
    }
}

/// Joins the text parts of the first candidate.
fn parse_generated_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: no candidate content"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim();
    if text.is_empty() {
        bail!("Gemini returned an empty summary");
    }
    Ok(text.to_string())
}

pub fn create_summarizer(config: &SummaryConfig) -> Result<Box<dyn Summarizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledSummarizer)),
        "gemini" => Ok(Box::new(GeminiSummarizer::new(config)?)),
        other => bail!("Unknown summary provider: {}", other),
    }
}
