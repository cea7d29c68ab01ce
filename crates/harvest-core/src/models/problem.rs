use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::media::MediaId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// The source no longer serves the item.
    MissingUpstream,
    /// Ambiguous duplicate match (too many results for a hash).
    UploadConflict,
    /// The repository rejected the upload.
    UploadFailure,
    /// Per-item processing failed for another reason.
    ProcessingFailure,
}

impl Display for ProblemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProblemKind::MissingUpstream => write!(f, "missing_upstream"),
            ProblemKind::UploadConflict => write!(f, "upload_conflict"),
            ProblemKind::UploadFailure => write!(f, "upload_failure"),
            ProblemKind::ProcessingFailure => write!(f, "processing_failure"),
        }
    }
}

impl FromStr for ProblemKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing_upstream" => Ok(ProblemKind::MissingUpstream),
            "upload_conflict" => Ok(ProblemKind::UploadConflict),
            "upload_failure" => Ok(ProblemKind::UploadFailure),
            "processing_failure" => Ok(ProblemKind::ProcessingFailure),
            _ => Err(anyhow::anyhow!("Invalid problem kind: {}", s)),
        }
    }
}

/// Human review status of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ProblemStatus {
    Open,
    Reviewed,
    Resolved,
}

impl Display for ProblemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProblemStatus::Open => write!(f, "open"),
            ProblemStatus::Reviewed => write!(f, "reviewed"),
            ProblemStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for ProblemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ProblemStatus::Open),
            "reviewed" => Ok(ProblemStatus::Reviewed),
            "resolved" => Ok(ProblemStatus::Resolved),
            _ => Err(anyhow::anyhow!("Invalid problem status: {}", s)),
        }
    }
}

/// Persisted anomaly requiring human review, one per organization + media id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub org_id: String,
    pub media_id: String,
    pub kind: ProblemKind,
    pub error_message: String,
    pub status: ProblemStatus,
    pub occurrences: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Problem {
    pub fn new(key: &MediaId, kind: ProblemKind, error_message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            org_id: key.org_id.clone(),
            media_id: key.media_id.clone(),
            kind,
            error_message: error_message.into(),
            status: ProblemStatus::Open,
            occurrences: 1,
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    pub fn key(&self) -> MediaId {
        MediaId::new(self.org_id.clone(), self.media_id.clone())
    }

    pub fn is_open(&self) -> bool {
        self.status == ProblemStatus::Open
    }

    pub fn same_cause(&self, kind: ProblemKind, error_message: &str) -> bool {
        self.kind == kind && self.error_message == error_message
    }

    /// Record another occurrence. The same cause bumps the counter and keeps the
    /// review status unless it was resolved; a different cause restarts the
    /// record and reopens it.
    pub fn recur(&mut self, kind: ProblemKind, error_message: &str) {
        let now = Utc::now();
        if self.same_cause(kind, error_message) {
            self.occurrences += 1;
            if self.status == ProblemStatus::Resolved {
                self.status = ProblemStatus::Open;
            }
        } else {
            self.kind = kind;
            self.error_message = error_message.to_string();
            self.occurrences = 1;
            self.status = ProblemStatus::Open;
            self.first_seen_at = now;
        }
        self.last_seen_at = now;
    }
}
