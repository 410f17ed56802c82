//! SQLite implementations of [`EmbeddingStore`] and [`MeetingRegistry`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::vec_to_blob;
use crate::models::{EmbeddingRecord, Meeting, NewMeeting};
use crate::traits::{EmbeddingStore, MeetingRegistry};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete embedding rows that never received their vector and return
    /// how many were removed.
    pub async fn repair_orphans(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM source_code_embeddings WHERE summary_embedding IS NULL")
                .execute(&self.pool)
                .await?;
        let removed = result.rows_affected();
        info!(removed, "Removed embedding rows without a vector");
        Ok(removed)
    }

    /// Rows with a vector for `project_id`.
    pub async fn count_embeddings(&self, project_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM source_code_embeddings
             WHERE project_id = ? AND summary_embedding IS NOT NULL",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        let row: Option<(String, String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, project_id, meeting_url, name, status, created_at
             FROM meetings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, project_id, meeting_url, name, status, created_at)| Meeting {
                id,
                project_id,
                meeting_url,
                name,
                status,
                created_at,
            },
        ))
    }
}

#[async_trait]
impl EmbeddingStore for SqliteStore {
    async fn store_record(&self, project_id: &str, record: &EmbeddingRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO source_code_embeddings
                (id, project_id, file_name, summary, source_code, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(project_id)
        .bind(&record.file_name)
        .bind(&record.summary)
        .bind(&record.source_code)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert row for {}", record.file_name))?;

        sqlx::query("UPDATE source_code_embeddings SET summary_embedding = ? WHERE id = ?")
            .bind(vec_to_blob(&record.embedding))
            .bind(&id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to attach vector for {}", record.file_name))?;

        tx.commit().await?;

        debug!(id = %id, file = %record.file_name, "Stored embedding");
        Ok(id)
    }
}

#[async_trait]
impl MeetingRegistry for SqliteStore {
    async fn create_meeting(&self, meeting: &NewMeeting) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO meetings (id, project_id, meeting_url, name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&meeting.project_id)
        .bind(&meeting.meeting_url)
        .bind(&meeting.name)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to create meeting")?;

        info!(meeting_id = %id, project_id = %meeting.project_id, "Meeting created");
        Ok(id)
    }
}
