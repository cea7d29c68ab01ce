//! Upload eligibility rules.
//!
//! Pure functions over one media, one file and the organization's upload policy.
//! The scheduled path uses [`UploadPolicy::should_upload_auto`], which never lets
//! `MANUAL` organizations submit anything; human-triggered runs use
//! [`UploadPolicy::should_upload`], which also accepts files ignored for a
//! soft reason (see [`MANUAL_OVERRIDABLE_REASONS`]).

use crate::models::{FileMetadata, Media, UploadMode};

/// Marker put in an ignored reason when an upstream reference could not be resolved.
pub const UNRESOLVABLE_MARKER: &str = "unresolvable";

/// Substrings of an ignored reason that a human operator may override.
pub const MANUAL_OVERRIDABLE_REASONS: [&str; 5] = [
    "block list",
    "likely",
    "Photoset ignored",
    "Public Domain Mark",
    UNRESOLVABLE_MARKER,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub upload_mode: UploadMode,
    pub min_year_upload_auto: i32,
}

impl UploadPolicy {
    pub fn new(upload_mode: UploadMode, min_year_upload_auto: i32) -> Self {
        Self {
            upload_mode,
            min_year_upload_auto,
        }
    }

    /// `AUTO`, or `AUTO_FROM_DATE` with a manual trigger or a recent enough media.
    /// An unknown year is never recent enough.
    fn allows_automatic(&self, media: &Media, is_manual: bool) -> bool {
        match self.upload_mode {
            UploadMode::Auto => true,
            UploadMode::AutoFromDate => {
                is_manual
                    || media
                        .year()
                        .is_some_and(|year| year >= self.min_year_upload_auto)
            }
            UploadMode::Manual => false,
        }
    }

    pub fn should_upload<F>(
        &self,
        media: &Media,
        file: &FileMetadata,
        is_manual: bool,
        is_permitted_file_type: F,
    ) -> bool
    where
        F: Fn(&FileMetadata) -> bool,
    {
        (self.allows_automatic(media, is_manual) || self.upload_mode == UploadMode::Manual)
            && !is_forbidden_upload(file, is_manual)
            && file.target_filenames.is_empty()
            && is_permitted_file_type(file)
    }

    pub fn should_upload_auto<F>(
        &self,
        media: &Media,
        file: &FileMetadata,
        is_manual: bool,
        is_permitted_file_type: F,
    ) -> bool
    where
        F: Fn(&FileMetadata) -> bool,
    {
        self.allows_automatic(media, is_manual)
            && !file.ignored
            && file.target_filenames.is_empty()
            && is_permitted_file_type(file)
    }
}

/// A file is forbidden when ignored, unless a manual run meets a soft reason.
pub fn is_forbidden_upload(file: &FileMetadata, is_manual: bool) -> bool {
    file.ignored && (!is_manual || !has_overridable_reason(file))
}

/// A media is forbidden when every one of its files is forbidden.
///
/// A media without files is forbidden as well: there is nothing to upload.
pub fn is_forbidden_media(media: &Media, is_manual: bool) -> bool {
    media
        .files
        .iter()
        .all(|file| is_forbidden_upload(file, is_manual))
}

fn has_overridable_reason(file: &FileMetadata) -> bool {
    file.ignored_reason.as_deref().is_some_and(|reason| {
        MANUAL_OVERRIDABLE_REASONS
            .iter()
            .any(|soft| reason.contains(soft))
    })
}
