//! `codemate meeting upload`: wires the uploader to S3, SQLite and the
//! processing endpoint.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::storage::S3ObjectStore;
use crate::store::SqliteStore;
use crate::traits::ProcessTrigger;
use crate::upload::{
    validate_file, HttpProcessTrigger, MeetingUploader, SkipProcessing, UploadFile,
};

/// Upload a recording for `project_id`, register it, and wait for the
/// processing trigger to be sent.
pub async fn run_meeting_upload(config: &Config, project_id: &str, path: &Path) -> Result<()> {
    let file = UploadFile::from_path(path)?;
    // Reject before credentials or the database are touched.
    validate_file(&file.name, file.size)?;

    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;

    let trigger: Arc<dyn ProcessTrigger> = match &config.meetings.process_url {
        Some(url) => Arc::new(HttpProcessTrigger::new(url.clone())?),
        None => Arc::new(SkipProcessing),
    };
    let uploader = MeetingUploader::new(
        Arc::new(S3ObjectStore::from_env(&config.storage)?),
        Arc::new(SqliteStore::new(pool.clone())),
        trigger,
        config.storage.key_prefix.clone(),
    );

    let upload = uploader.upload_meeting(project_id, vec![file]).await?;

    println!("meeting upload");
    println!("  meeting id: {}", upload.meeting_id);
    println!("  url: {}", upload.public_url);

    // The CLI exits right after; let the trigger finish first.
    upload.processing.await?;

    pool.close().await;
    Ok(())
}
