//! # codemate-ingest
//!
//! Project ingestion and meeting upload for CodeMate.
//!
//! Two independent flows:
//!
//! - **Indexing:** count a GitHub repository's files (the "credits" check),
//!   load every file, ask a generative model for a summary of each, embed
//!   the summaries, and persist them for semantic search.
//! - **Meeting upload:** validate an audio recording, store it in
//!   S3-compatible object storage, register the meeting, and trigger its
//!   processing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ TreeWalker  │   │   Loader     │──▶│   Pipeline   │──▶│  SQLite  │
//! │ (credits)   │   │ git trees    │   │ summary+embed│   │ + search │
//! └──────┬──────┘   └──────┬───────┘   └──────────────┘   └──────────┘
//!        └────────┬────────┘
//!                 ▼
//!        RepoHost (GitHub REST, rate-limited)
//!
//! ┌──────────────┐   ┌─────────────┐   ┌─────────────────┐   ┌────────────────┐
//! │ UploadFile   │──▶│ ObjectStore │──▶│ MeetingRegistry │──▶│ ProcessTrigger │
//! │ (validated)  │   │ (S3 SigV4)  │   │ (SQLite)        │   │ (HTTP, async)  │
//! └──────────────┘   └─────────────┘   └─────────────────┘   └────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`github`] | Repository host trait and GitHub client |
//! | [`rate_limit`] | Quota cool-down and retry policy |
//! | [`tree_walker`] | File counting for the credits check |
//! | [`loader`] | Repository document loading |
//! | [`summary`] | Source-file summaries |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`pipeline`] | Summarise, embed and persist a repository |
//! | [`traits`] | Persistence and dispatch seams |
//! | [`store`] | SQLite store and meeting registry |
//! | [`search`] | Semantic search over stored embeddings |
//! | [`storage`] | S3-compatible object storage |
//! | [`upload`] | Meeting upload validation and dispatch |
//! | [`progress`] | Indexing progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod github;
pub mod index_cmd;
pub mod loader;
pub mod meeting_cmd;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod rate_limit;
pub mod search;
pub mod storage;
pub mod store;
pub mod summary;
pub mod traits;
pub mod tree_walker;
pub mod upload;
