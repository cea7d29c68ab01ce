//! Table and JSON rendering for command output.

use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;

use harvest_core::models::{Page, Problem, Statistics};
use harvest_orgs::OrgDefinition;

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn render_stats_table(stats: &[Statistics]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<24} {:>7} {:>8} {:>8} {:>8} {:>9} {:>8} {:>7} {:>9}",
        "ORG", "NAME", "TOTAL", "MISSING", "IMAGES", "VIDEOS", "UPLOADED", "IGNORED", "HASHED", "PROBLEMS"
    );
    for s in stats {
        let _ = writeln!(
            out,
            "{:<12} {:<24} {:>7} {:>8} {:>8} {:>8} {:>9} {:>8} {:>7} {:>9}",
            truncate_string(&s.org_id, 12),
            truncate_string(&s.org_name, 24),
            s.total_media,
            s.missing_media,
            s.missing_images,
            s.missing_videos,
            s.uploaded_media,
            s.ignored_media,
            s.hashed_media,
            s.open_problems
        );
    }
    out
}

pub fn render_problems_table(page: &Page<Problem>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<18} {:<9} {:>5} {:<20} MESSAGE",
        "MEDIA", "KIND", "STATUS", "SEEN", "LAST SEEN"
    );
    for problem in &page.items {
        let _ = writeln!(
            out,
            "{:<20} {:<18} {:<9} {:>5} {:<20} {}",
            truncate_string(&problem.media_id, 20),
            problem.kind.to_string(),
            problem.status.to_string(),
            problem.occurrences,
            problem.last_seen_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            truncate_string(&problem.error_message, 60)
        );
    }
    let _ = writeln!(
        out,
        "\nPage {} of {} ({} problems)",
        page.page + 1,
        page.total_pages().max(1),
        page.total
    );
    out
}

pub fn render_orgs_table(definitions: &[OrgDefinition]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<24} {:<15} {:>8} SOURCE",
        "ORG", "NAME", "MODE", "MIN YEAR"
    );
    for d in definitions {
        let _ = writeln!(
            out,
            "{:<12} {:<24} {:<15} {:>8} {}",
            truncate_string(&d.id, 12),
            truncate_string(&d.name, 24),
            d.upload_mode.to_string(),
            d.min_year_upload_auto,
            d.source.as_ref().map_or("-", |s| s.feed_url.as_str())
        );
    }
    out
}
