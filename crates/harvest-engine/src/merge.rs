//! Merging upstream records into stored media.

use chrono::Utc;

use harvest_core::models::{extension_of, FileMetadata, Media};

use crate::adapter::{RawFile, RawMediaItem};

/// Apply an upstream record to a stored media. Returns whether anything changed.
///
/// Local state (hashes, ignore flags, target filenames) survives. A file whose
/// size changed loses its hashes so they are recomputed. Files that vanished
/// upstream are dropped unless already uploaded.
pub fn merge_raw(media: &mut Media, raw: &RawMediaItem) -> bool {
    let mut changed = false;

    if media.title != raw.title {
        media.title = raw.title.clone();
        changed = true;
    }
    if media.description != raw.description {
        media.description = raw.description.clone();
        changed = true;
    }
    if media.publication_date != raw.publication_date {
        media.publication_date = raw.publication_date;
        changed = true;
    }
    if media.publication_year != raw.publication_year {
        media.publication_year = raw.publication_year;
        changed = true;
    }

    let mut files = Vec::with_capacity(raw.files.len());
    for raw_file in &raw.files {
        match media.files.iter().position(|f| f.asset_url == raw_file.asset_url) {
            Some(index) => {
                let mut file = media.files.remove(index);
                changed |= merge_file(&mut file, raw_file);
                files.push(file);
            }
            None => {
                files.push(new_file(raw_file));
                changed = true;
            }
        }
    }
    for leftover in media.files.drain(..) {
        if leftover.is_uploaded() {
            files.push(leftover);
        } else {
            changed = true;
        }
    }
    media.files = files;

    media.fetched_at = Utc::now();
    if changed {
        media.touch();
    }
    changed
}

fn new_file(raw: &RawFile) -> FileMetadata {
    let mut file = FileMetadata::new(raw.asset_url.clone());
    file.size = raw.size;
    file.media_type = raw.media_type.or_else(|| file.resolved_media_type());
    file
}

fn merge_file(file: &mut FileMetadata, raw: &RawFile) -> bool {
    let mut changed = false;

    if raw.size.is_some() && raw.size != file.size {
        if file.size.is_some() {
            file.sha256 = None;
            file.phash = None;
        }
        file.size = raw.size;
        changed = true;
    }

    let media_type = raw.media_type.or_else(|| file.resolved_media_type());
    if media_type != file.media_type {
        file.media_type = media_type;
        changed = true;
    }
    if file.extension.is_none() {
        file.extension = extension_of(&file.asset_url);
        changed |= file.extension.is_some();
    }

    changed
}
