//! Media source adapter contract
//!
//! One adapter per organization. Adapters translate a remote archive into
//! [`RawMediaItem`]s; everything after that is organization-agnostic.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use harvest_core::models::{Media, MediaType};
use harvest_core::SourceError;

/// Opaque position in a source's listing.
pub type Cursor = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub asset_url: String,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub size: Option<i64>,
}

impl RawFile {
    pub fn new(asset_url: impl Into<String>) -> Self {
        Self {
            asset_url: asset_url.into(),
            media_type: None,
            size: None,
        }
    }
}

/// A media record as the source reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMediaItem {
    /// Source-specific id, unique within the organization.
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub files: Vec<RawFile>,
}

impl RawMediaItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            publication_date: None,
            publication_year: None,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPage {
    pub items: Vec<RawMediaItem>,
    /// `None` once the listing is exhausted.
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Found(RawMediaItem),
    /// The source no longer has the item.
    NotFound,
}

#[async_trait]
pub trait MediaSourceAdapter: Send + Sync {
    /// Fetch one page of at most `page_size` items, starting at `cursor`
    /// (`None` for the first page).
    async fn fetch(&self, cursor: Option<&str>, page_size: u32) -> Result<FetchPage, SourceError>;

    /// Re-read the current upstream state of a known media.
    async fn refresh(&self, media: &Media) -> Result<RefreshOutcome, SourceError>;
}
