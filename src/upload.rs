//! Meeting recording uploads.
//!
//! [`MeetingUploader::upload_meeting`] runs the whole flow:
//!
//! 1. validate the selection (one audio file, at most [`MAX_UPLOAD_BYTES`])
//!    before any network call,
//! 2. upload it to object storage under `<prefix>/<unix-millis>.<ext>`,
//! 3. register the meeting,
//! 4. trigger processing in the background.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::{NewMeeting, UploadOutcome, UploadResult};
use crate::traits::{MeetingRegistry, ObjectStore, ProcessTrigger};

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];
pub const MAX_UPLOAD_BYTES: u64 = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("no file selected")]
    NoFile,
    #[error("only one file can be uploaded at a time ({0} selected)")]
    TooManyFiles(usize),
    #[error("'{name}' is not a supported audio file (accepted: .mp3, .wav, .m4a)")]
    UnsupportedType { name: String },
    #[error("'{name}' is {size} bytes, the limit is {max} bytes")]
    TooLarge { name: String, size: u64, max: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum MeetingUploadError {
    #[error(transparent)]
    Rejected(#[from] UploadRejection),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("failed to register meeting: {0}")]
    RegistrationFailed(String),
}

enum FileSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

/// A file selected for upload. The size is known up front so a selection
/// can be rejected without reading it.
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Reads metadata only; the content is read when uploading.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    async fn into_bytes(self) -> Result<Vec<u8>> {
        match self.source {
            FileSource::Memory(bytes) => Ok(bytes),
            FileSource::Disk(path) => tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// Lowercased text after the last `.`, if any.
fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn audio_content_type(name: &str) -> Option<&'static str> {
    match extension(name)?.as_str() {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "m4a" => Some("audio/mp4"),
        _ => None,
    }
}

pub fn validate_file(name: &str, size: u64) -> Result<(), UploadRejection> {
    let accepted = extension(name)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !accepted {
        return Err(UploadRejection::UnsupportedType {
            name: name.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            name: name.to_string(),
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub fn validate_selection(files: &[UploadFile]) -> Result<(), UploadRejection> {
    match files {
        [] => Err(UploadRejection::NoFile),
        [file] => validate_file(&file.name, file.size),
        _ => Err(UploadRejection::TooManyFiles(files.len())),
    }
}

/// `<prefix>/<millis>.<ext>`; `bin` when the name has no extension.
pub fn object_key(prefix: &str, millis: i64, file_name: &str) -> String {
    let ext = extension(file_name).unwrap_or_else(|| "bin".to_string());
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}.{}", millis, ext)
    } else {
        format!("{}/{}.{}", prefix, millis, ext)
    }
}

/// Upload `file` and return its public address. Storage errors are
/// logged and returned as [`UploadOutcome::Failed`].
pub async fn upload_asset(
    store: &dyn ObjectStore,
    key_prefix: &str,
    file: UploadFile,
) -> UploadOutcome {
    let key = object_key(key_prefix, Utc::now().timestamp_millis(), &file.name);
    let content_type = audio_content_type(&file.name).unwrap_or("application/octet-stream");
    let name = file.name.clone();

    let bytes = match file.into_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(file = %name, error = %format!("{:#}", e), "Could not read upload");
            return UploadOutcome::Failed(format!("{:#}", e));
        }
    };

    match store.put_object(&key, content_type, bytes).await {
        Ok(()) => {
            let public_url = store.public_url(&key);
            info!(file = %name, key = %key, "Upload stored");
            UploadOutcome::Uploaded(UploadResult { public_url })
        }
        Err(e) => {
            error!(file = %name, key = %key, error = %format!("{:#}", e), "Upload failed");
            UploadOutcome::Failed(format!("{:#}", e))
        }
    }
}

/// Result of a successful meeting upload. `processing` completes when the
/// downstream trigger has been attempted.
#[derive(Debug)]
pub struct MeetingUpload {
    pub meeting_id: String,
    pub public_url: String,
    pub processing: JoinHandle<()>,
}

pub struct MeetingUploader {
    store: Arc<dyn ObjectStore>,
    registry: Arc<dyn MeetingRegistry>,
    trigger: Arc<dyn ProcessTrigger>,
    key_prefix: String,
}

impl MeetingUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn MeetingRegistry>,
        trigger: Arc<dyn ProcessTrigger>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            trigger,
            key_prefix: key_prefix.into(),
        }
    }

    pub async fn upload_meeting(
        &self,
        project_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<MeetingUpload, MeetingUploadError> {
        validate_selection(&files)?;
        let file = files.into_iter().next().ok_or(UploadRejection::NoFile)?;
        let name = file.name.clone();

        let public_url = match upload_asset(self.store.as_ref(), &self.key_prefix, file).await {
            UploadOutcome::Uploaded(result) => result.public_url,
            UploadOutcome::Failed(reason) => return Err(MeetingUploadError::UploadFailed(reason)),
        };

        let meeting_id = self
            .registry
            .create_meeting(&NewMeeting {
                project_id: project_id.to_string(),
                meeting_url: public_url.clone(),
                name,
            })
            .await
            .map_err(|e| MeetingUploadError::RegistrationFailed(format!("{:#}", e)))?;

        let trigger = Arc::clone(&self.trigger);
        let (url, id, project) = (public_url.clone(), meeting_id.clone(), project_id.to_string());
        let processing = tokio::spawn(async move {
            match trigger.trigger(&url, &id, &project).await {
                Ok(()) => info!(meeting_id = %id, "Meeting processing triggered"),
                Err(e) => error!(
                    meeting_id = %id,
                    error = %format!("{:#}", e),
                    "Failed to trigger meeting processing"
                ),
            }
        });

        Ok(MeetingUpload {
            meeting_id,
            public_url,
            processing,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    meeting_url: &'a str,
    meeting_id: &'a str,
    project_id: &'a str,
}

/// POSTs `{meetingUrl, meetingId, projectId}` to the processing endpoint.
pub struct HttpProcessTrigger {
    client: reqwest::Client,
    url: String,
}

impl HttpProcessTrigger {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ProcessTrigger for HttpProcessTrigger {
    async fn trigger(&self, meeting_url: &str, meeting_id: &str, project_id: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&ProcessRequest {
                meeting_url,
                meeting_id,
                project_id,
            })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when no processing endpoint is configured.
pub struct SkipProcessing;

#[async_trait]
impl ProcessTrigger for SkipProcessing {
    async fn trigger(&self, _meeting_url: &str, meeting_id: &str, _project_id: &str) -> Result<()> {
        warn!(meeting_id, "meetings.process_url not set, processing skipped");
        Ok(())
    }
}
