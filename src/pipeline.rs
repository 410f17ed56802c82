//! Embedding pipeline: load → summarise → embed → persist.
//!
//! Failures are isolated per document. A summary or embedding error leaves
//! an empty slot for that document; a persistence error is counted and the
//! remaining records are still written. Only a repository load failure
//! aborts the job.

use anyhow::{Context, Result};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

use crate::config::GithubConfig;
use crate::embedding::Embedder;
use crate::github::RepoHost;
use crate::loader::RepositoryLoader;
use crate::models::{EmbeddingRecord, RepositoryReference, SourceDocument};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::summary::Summarizer;
use crate::traits::EmbeddingStore;

/// Counts from [`persist`]. `skipped` are empty slots; `failed` are
/// records the store rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub generated: usize,
    pub persist: PersistReport,
}

/// Everything an indexing job talks to.
pub struct IndexContext<'a> {
    pub host: &'a dyn RepoHost,
    pub github: &'a GithubConfig,
    pub summarizer: &'a dyn Summarizer,
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn EmbeddingStore,
    pub progress: &'a dyn IndexProgressReporter,
    pub max_concurrency: usize,
}

/// Summarise and embed every document, at most `max_concurrency` at a
/// time. The result has one slot per document, in input order.
pub async fn generate_embeddings(
    documents: &[SourceDocument],
    summarizer: &dyn Summarizer,
    embedder: &dyn Embedder,
    max_concurrency: usize,
    progress: &dyn IndexProgressReporter,
) -> Vec<Option<EmbeddingRecord>> {
    let total = documents.len() as u64;
    let done = AtomicU64::new(0);
    let done = &done;

    stream::iter(documents)
        .map(|doc| async move {
            let record = embed_document(doc, summarizer, embedder).await;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(IndexProgressEvent::Generating { n, total });
            record
        })
        .buffered(max_concurrency.max(1))
        .collect()
        .await
}

async fn embed_document(
    doc: &SourceDocument,
    summarizer: &dyn Summarizer,
    embedder: &dyn Embedder,
) -> Option<EmbeddingRecord> {
    let summary = match summarizer.summarise(doc).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(file = %doc.path, error = %format!("{:#}", e), "Summary failed, skipping file");
            return None;
        }
    };

    let embedding = match embedder.embed(&summary).await {
        Ok(embedding) => embedding,
        Err(e) => {
            warn!(file = %doc.path, error = %format!("{:#}", e), "Embedding failed, skipping file");
            return None;
        }
    };

    Some(EmbeddingRecord {
        summary,
        embedding,
        source_code: doc.content.clone(),
        file_name: doc.path.clone(),
    })
}

/// Write every present record for `project_id`. Writes are independent:
/// one failure does not stop the others.
pub async fn persist(
    records: &[Option<EmbeddingRecord>],
    project_id: &str,
    store: &dyn EmbeddingStore,
    progress: &dyn IndexProgressReporter,
) -> PersistReport {
    let total = records.len() as u64;

    let outcomes = join_all(records.iter().enumerate().map(|(index, slot)| async move {
        let record = slot.as_ref()?;
        progress.report(IndexProgressEvent::Persisting {
            n: index as u64 + 1,
            total,
        });
        Some(match store.store_record(project_id, record).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    file = %record.file_name,
                    project_id,
                    error = %format!("{:#}", e),
                    "Failed to persist embedding"
                );
                false
            }
        })
    }))
    .await;

    let mut report = PersistReport::default();
    for outcome in outcomes {
        match outcome {
            Some(true) => report.stored += 1,
            Some(false) => report.failed += 1,
            None => report.skipped += 1,
        }
    }
    report
}

/// Load the repository, generate embeddings, and persist them under
/// `project_id`.
pub async fn index_repository(
    ctx: &IndexContext<'_>,
    project_id: &str,
    repo: &RepositoryReference,
) -> Result<IndexReport> {
    ctx.progress.report(IndexProgressEvent::Loading {
        repository: repo.slug(),
    });

    let loader = RepositoryLoader::new(ctx.host, ctx.github)?;
    let documents = loader
        .load_repository(repo)
        .await
        .with_context(|| format!("Failed to load repository {}", repo.slug()))?;

    let records = generate_embeddings(
        &documents,
        ctx.summarizer,
        ctx.embedder,
        ctx.max_concurrency,
        ctx.progress,
    )
    .await;
    let generated = records.iter().filter(|r| r.is_some()).count();

    let persisted = persist(&records, project_id, ctx.store, ctx.progress).await;

    info!(
        repository = %repo.slug(),
        project_id,
        documents = documents.len(),
        generated,
        stored = persisted.stored,
        failed = persisted.failed,
        "Indexing complete"
    );

    Ok(IndexReport {
        documents: documents.len(),
        generated,
        persist: persisted,
    })
}
