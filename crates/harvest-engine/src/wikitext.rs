//! Upload description page, target filename and announcement text.

use std::collections::BTreeSet;

use harvest_core::models::{FileMetadata, Media, MediaType};

const MAX_TITLE_CHARS: usize = 180;
const FORBIDDEN_FILENAME_CHARS: [char; 10] = ['#', '<', '>', '[', ']', '|', '{', '}', ':', '/'];

/// Inputs of the `{{Information}}` description page, resolved through the organization hooks.
#[derive(Debug, Clone)]
pub struct DescriptionPage<'a> {
    pub media: &'a Media,
    pub author: &'a str,
    pub source_url: &'a str,
    pub licence_templates: &'a BTreeSet<String>,
    pub categories: &'a BTreeSet<String>,
}

impl DescriptionPage<'_> {
    pub fn render(&self) -> String {
        let media = self.media;
        let description = media
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| media.display_title());
        let date = media
            .publication_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .or_else(|| media.year().map(|y| y.to_string()))
            .unwrap_or_default();

        let mut text = String::new();
        text.push_str("=={{int:filedesc}}==\n{{Information\n");
        text.push_str(&format!("|description={{{{en|1={}}}}}\n", escape_pipes(&description)));
        text.push_str(&format!("|date={}\n", date));
        text.push_str(&format!("|source={}\n", self.source_url));
        text.push_str(&format!("|author={}\n", escape_pipes(self.author)));
        text.push_str("}}\n\n=={{int:license-header}}==\n");
        for template in self.licence_templates {
            text.push_str(&format!("{{{{{}}}}}\n", template));
        }
        text.push('\n');
        for category in self.categories {
            text.push_str(&format!("[[Category:{}]]\n", category));
        }
        text
    }
}

fn escape_pipes(value: &str) -> String {
    value.replace('|', "{{!}}")
}

fn default_extension(media_type: Option<MediaType>) -> &'static str {
    match media_type {
        Some(MediaType::Video) => "webm",
        Some(MediaType::Audio) => "ogg",
        Some(MediaType::Document) => "pdf",
        Some(MediaType::Image) | None => "jpg",
    }
}

/// `"<title> (<source id>).<ext>"` stripped of characters the repository refuses.
///
/// Media with several files get a 1-based position suffix so every file has a
/// distinct name.
pub fn upload_filename(media: &Media, file: &FileMetadata) -> String {
    let title: String = media
        .display_title()
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .take(MAX_TITLE_CHARS)
        .collect();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    let id = media.id.media_id.replace(FORBIDDEN_FILENAME_CHARS, "-");
    let position = if media.files.len() > 1 {
        media
            .files
            .iter()
            .position(|f| f.asset_url == file.asset_url)
            .map(|i| format!(" {}", i + 1))
            .unwrap_or_default()
    } else {
        String::new()
    };
    let extension = file
        .extension
        .as_deref()
        .unwrap_or_else(|| default_extension(file.resolved_media_type()));

    format!("{} ({}{}).{}", title, id, position, extension)
}

/// Short announcement for a successful upload, with the organization's emojis and accounts.
pub fn announcement(
    media: &Media,
    target_filename: &str,
    emojis: &BTreeSet<String>,
    accounts: &BTreeSet<String>,
) -> String {
    let mut parts: Vec<String> = emojis.iter().cloned().collect();
    parts.push(media.display_title());
    parts.push(format!(
        "https://commons.wikimedia.org/wiki/File:{}",
        target_filename.trim_start_matches("File:").replace(' ', "_")
    ));
    parts.extend(accounts.iter().cloned());
    parts.join(" ")
}
