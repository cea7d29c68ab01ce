use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::file_metadata::FileMetadata;

/// Composite identifier: organization id + source-specific id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId {
    pub org_id: String,
    pub media_id: String,
}

impl MediaId {
    pub fn new(org_id: impl Into<String>, media_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            media_id: media_id.into(),
        }
    }
}

impl Display for MediaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.org_id, self.media_id)
    }
}

/// One logical item harvested from an organization, possibly multi-file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub publication_year: Option<i32>,
    pub files: Vec<FileMetadata>,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn new(id: MediaId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            description: None,
            publication_date: None,
            publication_year: None,
            files: Vec::new(),
            fetched_at: now,
            updated_at: now,
        }
    }

    /// Publication year, from the explicit year or the publication date.
    pub fn year(&self) -> Option<i32> {
        self.publication_year
            .or_else(|| self.publication_date.map(|d| d.year()))
    }

    pub fn file(&self, asset_url: &str) -> Option<&FileMetadata> {
        self.files.iter().find(|f| f.asset_url == asset_url)
    }

    pub fn file_mut(&mut self, asset_url: &str) -> Option<&mut FileMetadata> {
        self.files.iter_mut().find(|f| f.asset_url == asset_url)
    }

    /// True when the media has at least one file and every file is ignored.
    pub fn is_fully_ignored(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|f| f.ignored)
    }

    pub fn is_uploaded(&self) -> bool {
        self.files.iter().any(FileMetadata::is_uploaded)
    }

    /// Title if present, else the first line of the description, else the source id.
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.description
                    .as_deref()
                    .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
            })
            .unwrap_or(&self.id.media_id)
            .trim()
            .to_string()
    }

    /// Equal apart from the fetch and update timestamps.
    pub fn same_content(&self, other: &Media) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.publication_date == other.publication_date
            && self.publication_year == other.publication_year
            && self.files == other.files
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
