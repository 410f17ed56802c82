//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use codemate_ingest::embedding::Embedder;
use codemate_ingest::github::{
    ContentEntry, EntryKind, FileBody, Listing, ListingError, RepoHost, RepoTree, TreeEntry,
    TreeEntryKind,
};
use codemate_ingest::models::{EmbeddingRecord, NewMeeting, RepositoryReference, SourceDocument};
use codemate_ingest::progress::{IndexProgressEvent, IndexProgressReporter};
use codemate_ingest::summary::Summarizer;
use codemate_ingest::traits::{EmbeddingStore, MeetingRegistry, ObjectStore, ProcessTrigger};

pub fn repo() -> RepositoryReference {
    RepositoryReference {
        owner: "acme".into(),
        repo: "widgets".into(),
        token: None,
    }
}

// ─── Repository host ────────────────────────────────────────

pub fn file(path: &str) -> ContentEntry {
    ContentEntry {
        path: path.into(),
        kind: EntryKind::File,
    }
}

pub fn dir(path: &str) -> ContentEntry {
    ContentEntry {
        path: path.into(),
        kind: EntryKind::Dir,
    }
}

pub fn blob(path: &str) -> TreeEntry {
    TreeEntry {
        path: path.into(),
        kind: TreeEntryKind::Blob,
        size: Some(1),
    }
}

pub fn subtree(path: &str) -> TreeEntry {
    TreeEntry {
        path: path.into(),
        kind: TreeEntryKind::Tree,
        size: None,
    }
}

/// Scripted [`RepoHost`]. Every call is appended to `calls` as
/// `"<op> <path>"`.
#[derive(Default)]
pub struct FakeHost {
    listings: HashMap<String, Listing>,
    files: HashMap<String, FileBody>,
    tree: RepoTree,
    remaining: u64,
    fatal: HashSet<String>,
    /// Remaining quota rejections per call key (`"list <path>"`, `"rate"`, ...).
    quota_failures: Mutex<HashMap<String, u32>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            remaining: 5000,
            ..Self::default()
        }
    }

    pub fn with_dir(mut self, path: &str, entries: Vec<ContentEntry>) -> Self {
        self.listings
            .insert(path.into(), Listing::Directory(entries));
        self
    }

    pub fn with_file_listing(mut self, path: &str) -> Self {
        self.listings.insert(path.into(), Listing::File(file(path)));
        self
    }

    pub fn with_remaining(mut self, remaining: u64) -> Self {
        self.remaining = remaining;
        self
    }

    pub fn with_tree(mut self, entries: Vec<TreeEntry>, truncated: bool) -> Self {
        self.tree = RepoTree { entries, truncated };
        self
    }

    pub fn with_text(mut self, path: &str, content: &str) -> Self {
        self.files
            .insert(path.into(), FileBody::Bytes(content.as_bytes().to_vec()));
        self
    }

    pub fn with_body(mut self, path: &str, body: FileBody) -> Self {
        self.files.insert(path.into(), body);
        self
    }

    pub fn with_fatal(mut self, key: &str) -> Self {
        self.fatal.insert(key.into());
        self
    }

    pub fn with_quota_failures(self, key: &str, times: u32) -> Self {
        self.quota_failures
            .lock()
            .unwrap()
            .insert(key.into(), times);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn enter(&self, key: String) -> Result<(), ListingError> {
        self.calls.lock().unwrap().push(key.clone());

        if self.fatal.contains(&key) {
            return Err(ListingError::Status {
                context: key,
                status: 404,
                body: "Not Found".into(),
            });
        }

        let mut failures = self.quota_failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(ListingError::QuotaExceeded { status: 403 });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn rate_limit_remaining(&self, _repo: &RepositoryReference) -> Result<u64, ListingError> {
        self.enter("rate".into())?;
        Ok(self.remaining)
    }

    async fn list_contents(
        &self,
        _repo: &RepositoryReference,
        path: &str,
    ) -> Result<Listing, ListingError> {
        self.enter(format!("list {}", path))?;
        Ok(self.listings.get(path).cloned().unwrap_or(Listing::Other))
    }

    async fn list_tree(
        &self,
        _repo: &RepositoryReference,
        branch: &str,
    ) -> Result<RepoTree, ListingError> {
        self.enter(format!("tree {}", branch))?;
        Ok(self.tree.clone())
    }

    async fn fetch_file(
        &self,
        _repo: &RepositoryReference,
        path: &str,
        _branch: &str,
    ) -> Result<FileBody, ListingError> {
        self.enter(format!("fetch {}", path))?;
        Ok(self
            .files
            .get(path)
            .cloned()
            .unwrap_or_else(|| FileBody::Unavailable("missing".into())))
    }
}

// ─── Summaries and embeddings ───────────────────────────────

/// Summarises as `"summary of <path>"`. Files in `slow` take longer than the
/// rest so completion order differs from input order.
#[derive(Default)]
pub struct FakeSummarizer {
    pub fail: HashSet<String>,
    pub slow: HashSet<String>,
}

impl FakeSummarizer {
    pub fn failing(paths: &[&str]) -> Self {
        Self {
            fail: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarise(&self, doc: &SourceDocument) -> Result<String> {
        if self.slow.contains(&doc.path) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.fail.contains(&doc.path) {
            bail!("model refused {}", doc.path);
        }
        Ok(format!("summary of {}", doc.path))
    }
}

/// Two-dimensional vectors derived from the text length.
#[derive(Default)]
pub struct FakeEmbedder {
    pub fail_containing: Option<String>,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(needle) = &self.fail_containing {
            if text.contains(needle.as_str()) {
                bail!("embedding service unavailable");
            }
        }
        Ok(vec![1.0, text.len() as f32])
    }
}

pub fn document(path: &str) -> SourceDocument {
    SourceDocument {
        path: path.into(),
        content: format!("// {}", path),
        repository: "acme/widgets".into(),
    }
}

// ─── Persistence ────────────────────────────────────────────

/// Delegates to `inner` except for records named in `fail`.
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail: HashSet<String>,
}

#[async_trait]
impl<S: EmbeddingStore> EmbeddingStore for FlakyStore<S> {
    async fn store_record(&self, project_id: &str, record: &EmbeddingRecord) -> Result<String> {
        if self.fail.contains(&record.file_name) {
            bail!("disk full");
        }
        self.inner.store_record(project_id, record).await
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<IndexProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<IndexProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl IndexProgressReporter for RecordingProgress {
    fn report(&self, event: IndexProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ─── Meeting upload ─────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjectStore {
    pub fail: bool,
    /// `(key, content type, body length)` per successful put.
    pub puts: Mutex<Vec<(String, String, usize)>>,
    pub attempts: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn puts(&self) -> Vec<(String, String, usize)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            bail!("PUT s3://recordings/{} returned 503", key);
        }
        self.puts
            .lock()
            .unwrap()
            .push((key.into(), content_type.into(), body.len()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.example.com/{}", key)
    }
}

pub struct BrokenRegistry;

#[async_trait]
impl MeetingRegistry for BrokenRegistry {
    async fn create_meeting(&self, _meeting: &NewMeeting) -> Result<String> {
        bail!("database is locked")
    }
}

#[derive(Default)]
pub struct RecordingTrigger {
    /// `(meeting_url, meeting_id, project_id)` per call.
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl RecordingTrigger {
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessTrigger for RecordingTrigger {
    async fn trigger(&self, meeting_url: &str, meeting_id: &str, project_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push((
            meeting_url.into(),
            meeting_id.into(),
            project_id.into(),
        ));
        if self.fail {
            bail!("processing endpoint returned 500");
        }
        Ok(())
    }
}
