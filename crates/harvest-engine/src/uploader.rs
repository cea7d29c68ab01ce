use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use harvest_core::models::{FileMetadata, Media};

/// Everything the repository needs to accept one file.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest {
    pub media: Media,
    pub file: FileMetadata,
    pub filename: String,
    pub wikitext: String,
    pub categories: BTreeSet<String>,
    pub licence_templates: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailureKind {
    /// Duplicate or ambiguous hash match on the remote side.
    Conflict,
    Auth,
    Quota,
    BadName,
    Other,
}

impl fmt::Display for UploadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadFailureKind::Conflict => "conflict",
            UploadFailureKind::Auth => "auth",
            UploadFailureKind::Quota => "quota",
            UploadFailureKind::BadName => "bad_name",
            UploadFailureKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upload failed ({kind}): {message}")]
pub struct UploadFailure {
    pub kind: UploadFailureKind,
    pub message: String,
}

impl UploadFailure {
    pub fn new(kind: UploadFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(UploadFailureKind::Conflict, message)
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == UploadFailureKind::Conflict
    }
}

/// Submits files to the shared media repository.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Returns the target filename the repository stored the file under.
    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadFailure>;
}
