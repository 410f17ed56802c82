//! Persistence and dispatch seams.
//!
//! The indexing and upload flows only see these traits; the CLI wires them
//! to SQLite, S3-compatible storage and HTTP, and tests wire them to
//! in-memory fakes.
//!
//! ```text
//!   index_repository()                 upload_meeting()
//!         │                                  │
//!         ▼                                  ├──► ObjectStore     (put + public URL)
//!   EmbeddingStore  (row + vector)           ├──► MeetingRegistry (create meeting)
//!                                            └──► ProcessTrigger  (background POST)
//! ```
//!
//! The remaining seams live next to their implementations:
//! [`RepoHost`](crate::github::RepoHost),
//! [`Summarizer`](crate::summary::Summarizer) and
//! [`Embedder`](crate::embedding::Embedder).

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddingRecord, NewMeeting};

/// Durable storage for generated embeddings.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Persist one record for `project_id` and return its row id.
    ///
    /// The row and its vector are written together: either both are
    /// visible afterwards or neither is.
    async fn store_record(&self, project_id: &str, record: &EmbeddingRecord) -> Result<String>;
}

/// The create-meeting mutation.
#[async_trait]
pub trait MeetingRegistry: Send + Sync {
    /// Register an uploaded recording and return the new meeting id.
    async fn create_meeting(&self, meeting: &NewMeeting) -> Result<String>;
}

/// Object storage holding uploaded assets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<()>;

    /// Publicly reachable address of `key`.
    fn public_url(&self, key: &str) -> String;
}

/// Downstream processing of an uploaded meeting.
#[async_trait]
pub trait ProcessTrigger: Send + Sync {
    async fn trigger(&self, meeting_url: &str, meeting_id: &str, project_id: &str) -> Result<()>;
}
