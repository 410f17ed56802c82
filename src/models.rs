//! Core data models shared by the indexing and upload flows.

use serde::Serialize;

/// A repository on the hosting service, optionally with an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub owner: String,
    pub repo: String,
    pub token: Option<String>,
}

impl RepositoryReference {
    /// Parse `https://github.com/<owner>/<repo>[/...]`.
    ///
    /// Owner and repo are taken from the fourth and fifth `/`-separated
    /// segments. Returns `None` when either is missing or empty.
    pub fn parse(url: &str, token: Option<String>) -> Option<Self> {
        let segments: Vec<&str> = url.trim().split('/').collect();
        let owner = segments.get(3).copied().unwrap_or("");
        let repo = segments.get(4).copied().unwrap_or("");
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// `owner/repo`, used in logs and as the document origin.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A file loaded from a repository.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub content: String,
    pub repository: String,
}

/// Summary and embedding generated for one [`SourceDocument`].
///
/// The owning project is not stored here; it is supplied when the record is
/// persisted (see [`crate::pipeline::persist`]).
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub summary: String,
    pub embedding: Vec<f32>,
    pub source_code: String,
    pub file_name: String,
}

/// Public address of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub public_url: String,
}

/// Result of an object-storage upload. Storage errors are reported as
/// `Failed` instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(UploadResult),
    Failed(String),
}

impl UploadOutcome {
    pub fn public_url(&self) -> Option<&str> {
        match self {
            UploadOutcome::Uploaded(result) => Some(&result.public_url),
            UploadOutcome::Failed(_) => None,
        }
    }
}

/// Meeting registration request.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub project_id: String,
    pub meeting_url: String,
    pub name: String,
}

/// Meeting row as stored.
#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: String,
    pub project_id: String,
    pub meeting_url: String,
    pub name: String,
    pub status: String,
    pub created_at: i64,
}

/// A persisted embedding row ranked against a query vector.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub file_name: String,
    pub summary: String,
    pub source_code: String,
    pub similarity: f32,
}
