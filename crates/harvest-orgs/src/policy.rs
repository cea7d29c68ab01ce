//! Data-driven policy hooks
//!
//! Most organizations differ only by a handful of constants and keyword rules.
//! [`OrgPolicy`] holds that data and [`PolicyHooks`] implements every hook from
//! it, so a new organization is a definition entry rather than new code.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use harvest_core::models::{FileMetadata, Media};
use harvest_core::HarvestError;

use crate::hooks::{default_hidden_upload_category, OrgHooks};

/// Regex matched against title and description, adding a category on match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
}

/// Regex matched against title and description, ignoring every pending file on match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgPolicy {
    pub author: Option<String>,
    /// Source page URL with an `{id}` placeholder for the source-specific id.
    pub source_url_template: Option<String>,
    pub categories: Vec<String>,
    pub category_rules: Vec<CategoryRule>,
    pub licence_templates: Vec<String>,
    pub emojis: Vec<String>,
    pub twitter_accounts: Vec<String>,
    pub ignore_rules: Vec<IgnoreRule>,
    /// Boilerplate removed from descriptions (regexes).
    pub description_removals: Vec<String>,
    pub hidden_category: Option<String>,
}

#[derive(Debug)]
struct CompiledCategoryRule {
    regex: Regex,
    category: String,
}

#[derive(Debug)]
struct CompiledIgnoreRule {
    regex: Regex,
    reason: String,
}

/// [`OrgHooks`] implementation backed by an [`OrgPolicy`].
#[derive(Debug)]
pub struct PolicyHooks {
    policy: OrgPolicy,
    category_rules: Vec<CompiledCategoryRule>,
    ignore_rules: Vec<CompiledIgnoreRule>,
    description_removals: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, HarvestError> {
    Regex::new(pattern)
        .map_err(|e| HarvestError::Configuration(format!("Invalid pattern '{}': {}", pattern, e)))
}

impl PolicyHooks {
    pub fn new(policy: OrgPolicy) -> Result<Self, HarvestError> {
        let category_rules = policy
            .category_rules
            .iter()
            .map(|rule| {
                Ok(CompiledCategoryRule {
                    regex: compile(&rule.pattern)?,
                    category: rule.category.clone(),
                })
            })
            .collect::<Result<Vec<_>, HarvestError>>()?;
        let ignore_rules = policy
            .ignore_rules
            .iter()
            .map(|rule| {
                Ok(CompiledIgnoreRule {
                    regex: compile(&rule.pattern)?,
                    reason: rule.reason.clone(),
                })
            })
            .collect::<Result<Vec<_>, HarvestError>>()?;
        let description_removals = policy
            .description_removals
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, HarvestError>>()?;

        Ok(Self {
            policy,
            category_rules,
            ignore_rules,
            description_removals,
        })
    }

    pub fn policy(&self) -> &OrgPolicy {
        &self.policy
    }

    fn searchable_text(media: &Media) -> String {
        let mut text = String::new();
        if let Some(title) = &media.title {
            text.push_str(title);
        }
        if let Some(description) = &media.description {
            text.push('\n');
            text.push_str(description);
        }
        text
    }

    fn clean_description(&self, description: &str) -> String {
        let mut cleaned = description.to_string();
        for regex in &self.description_removals {
            cleaned = regex.replace_all(&cleaned, "").into_owned();
        }
        // collapse runs of blank lines left behind by removals
        let mut lines: Vec<&str> = Vec::new();
        for line in cleaned.lines().map(str::trim_end) {
            if line.trim().is_empty() && lines.last().map_or(true, |l| l.trim().is_empty()) {
                continue;
            }
            lines.push(line);
        }
        lines.join("\n").trim().to_string()
    }
}

impl OrgHooks for PolicyHooks {
    fn get_author(&self, _media: &Media, _file: &FileMetadata) -> Option<String> {
        self.policy.author.clone()
    }

    fn custom_processing(&self, media: &mut Media) -> bool {
        let mut changed = false;

        if let Some(description) = media.description.as_deref() {
            let cleaned = self.clean_description(description);
            if cleaned != description {
                media.description = Some(cleaned).filter(|d| !d.is_empty());
                changed = true;
            }
        }

        let text = Self::searchable_text(media);
        if let Some(rule) = self.ignore_rules.iter().find(|r| r.regex.is_match(&text)) {
            for file in media
                .files
                .iter_mut()
                .filter(|f| !f.ignored && !f.is_uploaded())
            {
                file.ignore(rule.reason.clone());
                changed = true;
            }
        }

        changed
    }

    fn find_categories(
        &self,
        media: &Media,
        _file: &FileMetadata,
        include_hidden: bool,
    ) -> BTreeSet<String> {
        let mut categories: BTreeSet<String> = self.policy.categories.iter().cloned().collect();
        let text = Self::searchable_text(media);
        categories.extend(
            self.category_rules
                .iter()
                .filter(|r| r.regex.is_match(&text))
                .map(|r| r.category.clone()),
        );
        if include_hidden {
            categories.insert(self.hidden_upload_category(&media.id.org_id));
        }
        categories
    }

    fn find_licence_templates(&self, _media: &Media, _file: &FileMetadata) -> BTreeSet<String> {
        self.policy.licence_templates.iter().cloned().collect()
    }

    fn get_emojis(&self, _media: &Media) -> BTreeSet<String> {
        self.policy.emojis.iter().cloned().collect()
    }

    fn get_twitter_accounts(&self, _media: &Media) -> BTreeSet<String> {
        self.policy.twitter_accounts.iter().cloned().collect()
    }

    fn hidden_upload_category(&self, org_id: &str) -> String {
        self.policy
            .hidden_category
            .clone()
            .unwrap_or_else(|| default_hidden_upload_category(org_id))
    }

    fn get_source_url(&self, media: &Media, file: &FileMetadata) -> String {
        match &self.policy.source_url_template {
            Some(template) => template.replace("{id}", &media.id.media_id),
            None => file.asset_url.clone(),
        }
    }
}
