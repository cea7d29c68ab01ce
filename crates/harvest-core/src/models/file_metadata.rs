use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::media_type::MediaType;

/// One physical file attached to a [`Media`](super::Media).
///
/// Files are identified inside their media by `asset_url`. Once
/// `target_filenames` is non-empty the file has been uploaded and is never
/// submitted again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub asset_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// SHA-256 of the file content, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Perceptual hash used for duplicate detection across sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phash: Option<String>,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_reason: Option<String>,
    #[serde(default)]
    pub target_filenames: BTreeSet<String>,
    /// Rejected upload attempts since the last success. Drives the per-file cooldown.
    #[serde(default)]
    pub upload_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload_failure_at: Option<DateTime<Utc>>,
}

/// Hashes computed for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    pub sha256: Option<String>,
    pub phash: Option<String>,
}

impl FileMetadata {
    pub fn new(asset_url: impl Into<String>) -> Self {
        let asset_url = asset_url.into();
        let extension = extension_of(&asset_url);
        let media_type = extension.as_deref().and_then(MediaType::from_extension);
        Self {
            asset_url,
            media_type,
            extension,
            size: None,
            sha256: None,
            phash: None,
            ignored: false,
            ignored_reason: None,
            target_filenames: BTreeSet::new(),
            upload_failures: 0,
            last_upload_failure_at: None,
        }
    }

    /// Media type, falling back to a guess from the extension.
    pub fn resolved_media_type(&self) -> Option<MediaType> {
        self.media_type.or_else(|| {
            self.extension
                .as_deref()
                .and_then(MediaType::from_extension)
        })
    }

    pub fn is_uploaded(&self) -> bool {
        !self.target_filenames.is_empty()
    }

    pub fn is_hashed(&self) -> bool {
        self.phash.is_some()
    }

    /// Not ignored and not uploaded yet.
    pub fn is_missing(&self) -> bool {
        !self.ignored && !self.is_uploaded()
    }

    pub fn ignore(&mut self, reason: impl Into<String>) {
        self.ignored = true;
        self.ignored_reason = Some(reason.into());
    }

    pub fn record_upload_failure(&mut self, at: DateTime<Utc>) {
        self.upload_failures = self.upload_failures.saturating_add(1);
        self.last_upload_failure_at = Some(at);
    }

    pub fn mark_uploaded(&mut self, target_filename: impl Into<String>) {
        self.target_filenames.insert(target_filename.into());
        self.upload_failures = 0;
        self.last_upload_failure_at = None;
    }

    /// Still waiting for upload after a rejection or a failed hash.
    pub fn is_unsettled(&self) -> bool {
        self.is_missing() && (self.upload_failures > 0 || self.sha256.is_none())
    }

    pub fn apply_hashes(&mut self, hashes: FileHashes) {
        if hashes.sha256.is_some() {
            self.sha256 = hashes.sha256;
        }
        if hashes.phash.is_some() {
            self.phash = hashes.phash;
        }
    }
}

/// Extension of the last path segment of a URL, lowercased, without query string.
pub fn extension_of(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
