//! Organization capability contract
//!
//! The engine only ever talks to an organization through these hooks, so adding
//! an organization never changes engine control flow. Every hook has a default;
//! implementations override the few that differ.

use std::collections::BTreeSet;
use std::fmt::Debug;

use harvest_core::models::{FileMetadata, Media};

/// Default hidden maintenance category for an organization.
pub fn default_hidden_upload_category(org_id: &str) -> String {
    format!("Files from {} uploaded by Harvest", org_id)
}

/// Policy hooks called by the engine at defined points of a cycle.
///
/// Hooks are pure functions of their arguments, except `custom_processing`
/// which may mutate the media it is given.
pub trait OrgHooks: Send + Sync + Debug {
    /// Author credited in the generated description. `None` lets the engine
    /// fall back to the organization name.
    fn get_author(&self, _media: &Media, _file: &FileMetadata) -> Option<String> {
        None
    }

    /// Organization-specific clean-up run after every refresh. May rewrite the
    /// description or ignore files. Returns whether anything changed.
    fn custom_processing(&self, _media: &mut Media) -> bool {
        false
    }

    fn find_categories(
        &self,
        media: &Media,
        _file: &FileMetadata,
        include_hidden: bool,
    ) -> BTreeSet<String> {
        let mut categories = BTreeSet::new();
        if include_hidden {
            categories.insert(self.hidden_upload_category(&media.id.org_id));
        }
        categories
    }

    /// Licence templates for the file. An empty set means the file cannot be uploaded.
    fn find_licence_templates(&self, _media: &Media, _file: &FileMetadata) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn get_emojis(&self, _media: &Media) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Accounts to mention when announcing uploads.
    fn get_twitter_accounts(&self, _media: &Media) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn hidden_upload_category(&self, org_id: &str) -> String {
        default_hidden_upload_category(org_id)
    }

    fn get_source_url(&self, _media: &Media, file: &FileMetadata) -> String {
        file.asset_url.clone()
    }
}

/// Hooks with every default, for organizations that need no policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl OrgHooks for DefaultHooks {}
