use serde::{Deserialize, Serialize};

use super::file_metadata::FileMetadata;
use super::media::Media;
use super::media_type::MediaType;

/// Per-organization counts derived from persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub org_id: String,
    pub org_name: String,
    pub total_media: i64,
    pub missing_media: i64,
    pub missing_images: i64,
    pub missing_videos: i64,
    pub uploaded_media: i64,
    pub ignored_media: i64,
    pub hashed_media: i64,
    pub open_problems: i64,
}

/// Predicates used to count media. Stores implement each one natively;
/// [`MediaCountFilter::matches`] is the reference definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCountFilter {
    All,
    /// At least one file neither ignored nor uploaded.
    Missing,
    MissingImages,
    MissingVideos,
    /// At least one file with a target filename.
    Uploaded,
    /// At least one file, and every file ignored.
    Ignored,
    /// At least one file with a perceptual hash.
    Hashed,
}

impl MediaCountFilter {
    pub const ALL: [MediaCountFilter; 7] = [
        MediaCountFilter::All,
        MediaCountFilter::Missing,
        MediaCountFilter::MissingImages,
        MediaCountFilter::MissingVideos,
        MediaCountFilter::Uploaded,
        MediaCountFilter::Ignored,
        MediaCountFilter::Hashed,
    ];

    pub fn matches(&self, media: &Media) -> bool {
        let missing_of = |t: MediaType| {
            media
                .files
                .iter()
                .any(|f| f.is_missing() && f.resolved_media_type() == Some(t))
        };
        match self {
            MediaCountFilter::All => true,
            MediaCountFilter::Missing => media.files.iter().any(FileMetadata::is_missing),
            MediaCountFilter::MissingImages => missing_of(MediaType::Image),
            MediaCountFilter::MissingVideos => missing_of(MediaType::Video),
            MediaCountFilter::Uploaded => media.is_uploaded(),
            MediaCountFilter::Ignored => media.is_fully_ignored(),
            MediaCountFilter::Hashed => media.files.iter().any(FileMetadata::is_hashed),
        }
    }
}
