//! Summarise → embed → persist, with fake providers and a real SQLite store.

mod common;

use std::collections::HashSet;

use codemate_ingest::config::GithubConfig;
use codemate_ingest::db;
use codemate_ingest::migrate::migrate_pool;
use codemate_ingest::models::EmbeddingRecord;
use codemate_ingest::pipeline::{
    generate_embeddings, index_repository, persist, IndexContext, PersistReport,
};
use codemate_ingest::progress::{IndexProgressEvent, NoProgress};
use codemate_ingest::store::SqliteStore;
use tempfile::TempDir;

use common::{
    blob, document, repo, FakeEmbedder, FakeHost, FakeSummarizer, FlakyStore, RecordingProgress,
};

async fn sqlite_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/codemate.sqlite"))
        .await
        .unwrap();
    migrate_pool(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn record(file_name: &str) -> EmbeddingRecord {
    EmbeddingRecord {
        summary: format!("summary of {}", file_name),
        embedding: vec![0.6, 0.8],
        source_code: "fn main() {}".into(),
        file_name: file_name.into(),
    }
}

// ─── generate_embeddings ────────────────────────────────────

#[tokio::test]
async fn one_slot_per_document_in_input_order() {
    let docs = vec![document("a.ts"), document("b.ts"), document("c.ts")];
    let summarizer = FakeSummarizer {
        slow: ["a.ts".to_string()].into_iter().collect(),
        ..FakeSummarizer::default()
    };
    let progress = RecordingProgress::default();

    let records =
        generate_embeddings(&docs, &summarizer, &FakeEmbedder::default(), 3, &progress).await;

    let names: Vec<&str> = records
        .iter()
        .map(|r| r.as_ref().unwrap().file_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.ts", "b.ts", "c.ts"]);

    let first = records[0].as_ref().unwrap();
    assert_eq!(first.summary, "summary of a.ts");
    assert_eq!(first.source_code, "// a.ts");
    assert_eq!(first.embedding, vec![1.0, "summary of a.ts".len() as f32]);

    let events = progress.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2], IndexProgressEvent::Generating { n: 3, total: 3 });
}

#[tokio::test]
async fn failed_summary_leaves_only_that_slot_empty() {
    let docs = vec![document("a.ts"), document("b.ts"), document("c.ts")];
    let summarizer = FakeSummarizer::failing(&["b.ts"]);

    let records =
        generate_embeddings(&docs, &summarizer, &FakeEmbedder::default(), 16, &NoProgress).await;

    assert_eq!(records.len(), 3);
    assert!(records[0].is_some());
    assert!(records[1].is_none());
    assert!(records[2].is_some());
}

#[tokio::test]
async fn failed_embedding_leaves_only_that_slot_empty() {
    let docs = vec![document("a.ts"), document("b.ts"), document("c.ts")];
    let embedder = FakeEmbedder {
        fail_containing: Some("c.ts".into()),
    };

    let records =
        generate_embeddings(&docs, &FakeSummarizer::default(), &embedder, 1, &NoProgress).await;

    assert!(records[0].is_some());
    assert!(records[1].is_some());
    assert!(records[2].is_none());
}

#[tokio::test]
async fn no_documents_no_records() {
    let progress = RecordingProgress::default();
    let records = generate_embeddings(
        &[],
        &FakeSummarizer::default(),
        &FakeEmbedder::default(),
        4,
        &progress,
    )
    .await;

    assert!(records.is_empty());
    assert!(progress.events().is_empty());
}

// ─── persist ────────────────────────────────────────────────

#[tokio::test]
async fn persists_every_record_despite_one_failure() {
    let (_tmp, store) = sqlite_store().await;
    let flaky = FlakyStore {
        inner: store.clone(),
        fail: ["c.ts".to_string()].into_iter().collect(),
    };
    let records = vec![
        Some(record("a.ts")),
        None,
        Some(record("c.ts")),
        Some(record("d.ts")),
    ];
    let progress = RecordingProgress::default();

    let report = persist(&records, "proj-1", &flaky, &progress).await;

    assert_eq!(
        report,
        PersistReport {
            stored: 2,
            skipped: 1,
            failed: 1
        }
    );
    assert_eq!(store.count_embeddings("proj-1").await.unwrap(), 2);
    assert_eq!(store.repair_orphans().await.unwrap(), 0);

    let persisting: Vec<IndexProgressEvent> = progress.events();
    assert_eq!(persisting.len(), 3);
    assert!(persisting.contains(&IndexProgressEvent::Persisting { n: 4, total: 4 }));
}

#[tokio::test]
async fn persist_scopes_rows_to_the_project() {
    let (_tmp, store) = sqlite_store().await;
    let records = vec![Some(record("a.ts")), Some(record("b.ts"))];

    persist(&records, "proj-1", &store, &NoProgress).await;
    persist(&records[..1], "proj-2", &store, &NoProgress).await;

    assert_eq!(store.count_embeddings("proj-1").await.unwrap(), 2);
    assert_eq!(store.count_embeddings("proj-2").await.unwrap(), 1);
}

// ─── index_repository ───────────────────────────────────────

#[tokio::test]
async fn indexes_a_repository_end_to_end() {
    let host = FakeHost::new()
        .with_tree(
            vec![
                blob("src/auth.ts"),
                blob("src/billing.ts"),
                blob("src/broken.ts"),
                blob("package-lock.json"),
            ],
            true,
        )
        .with_text("src/auth.ts", "export function login() {}")
        .with_text("src/billing.ts", "export function charge() {}")
        .with_text("src/broken.ts", "???")
        .with_text("package-lock.json", "{}");
    let (_tmp, store) = sqlite_store().await;
    let github = GithubConfig::default();
    let summarizer = FakeSummarizer::failing(&["src/broken.ts"]);
    let embedder = FakeEmbedder::default();
    let progress = RecordingProgress::default();

    let ctx = IndexContext {
        host: &host,
        github: &github,
        summarizer: &summarizer,
        embedder: &embedder,
        store: &store,
        progress: &progress,
        max_concurrency: 16,
    };
    let report = index_repository(&ctx, "proj-1", &repo()).await.unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.generated, 2);
    assert_eq!(report.persist.stored, 2);
    assert_eq!(report.persist.skipped, 1);
    assert_eq!(store.count_embeddings("proj-1").await.unwrap(), 2);

    let events = progress.events();
    assert_eq!(
        events[0],
        IndexProgressEvent::Loading {
            repository: "acme/widgets".into()
        }
    );

    let names: HashSet<String> = sqlx::query_scalar::<_, String>(
        "SELECT file_name FROM source_code_embeddings WHERE project_id = 'proj-1'",
    )
    .fetch_all(store.pool())
    .await
    .unwrap()
    .into_iter()
    .collect();
    assert!(names.contains("src/auth.ts"));
    assert!(names.contains("src/billing.ts"));
}

#[tokio::test]
async fn load_failure_aborts_before_any_generation() {
    let host = FakeHost::new().with_fatal("tree main");
    let (_tmp, store) = sqlite_store().await;
    let github = GithubConfig::default();
    let summarizer = FakeSummarizer::default();
    let embedder = FakeEmbedder::default();
    let progress = RecordingProgress::default();

    let ctx = IndexContext {
        host: &host,
        github: &github,
        summarizer: &summarizer,
        embedder: &embedder,
        store: &store,
        progress: &progress,
        max_concurrency: 16,
    };
    let err = index_repository(&ctx, "proj-1", &repo()).await.unwrap_err();

    assert!(format!("{:#}", err).contains("acme/widgets"));
    assert_eq!(progress.events().len(), 1);
    assert_eq!(store.count_embeddings("proj-1").await.unwrap(), 0);
}
