//! Semantic search over a project's stored summary embeddings.
//!
//! Vectors are ranked by cosine similarity in Rust; rows below
//! `pipeline.min_similarity` are dropped.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::models::SearchHit;

/// Rank `project_id`'s embeddings against `query_vec`.
///
/// Hits below `min_similarity` are dropped; the rest are ordered by
/// similarity (descending, ties by file name) and cut to `limit`.
pub async fn search_similar(
    pool: &SqlitePool,
    project_id: &str,
    query_vec: &[f32],
    limit: usize,
    min_similarity: f32,
) -> Result<Vec<SearchHit>> {
    // Vectors are compared in Rust; SQLite only filters by project.
    let rows = sqlx::query(
        r#"
        SELECT id, file_name, summary, source_code, summary_embedding
        FROM source_code_embeddings
        WHERE project_id = ? AND summary_embedding IS NOT NULL
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut hits: Vec<SearchHit> = rows
        .iter()
        .filter_map(|row| {
            let blob: Vec<u8> = row.get("summary_embedding");
            let similarity =
                embedding::cosine_similarity(query_vec, &embedding::blob_to_vec(&blob));
            (similarity >= min_similarity).then(|| SearchHit {
                id: row.get("id"),
                file_name: row.get("file_name"),
                summary: row.get("summary"),
                source_code: row.get("source_code"),
                similarity,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    hits.truncate(limit);

    Ok(hits)
}

/// Embed `question` and print the best matching files of `project_id`.
pub async fn run_search(
    config: &Config,
    embedder: &dyn Embedder,
    project_id: &str,
    question: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let query_vec = embedder.embed(question).await?;
    let pool = db::connect(config).await?;
    let hits = search_similar(
        &pool,
        project_id,
        &query_vec,
        limit.unwrap_or(config.pipeline.search_limit),
        config.pipeline.min_similarity,
    )
    .await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.similarity, hit.file_name);
        println!("    summary: \"{}\"", hit.summary.replace('\n', " ").trim());
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}
