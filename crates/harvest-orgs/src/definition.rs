//! Organization definitions loaded from a JSON file.
//!
//! ```json
//! {
//!   "organizations": [
//!     {
//!       "id": "nasa",
//!       "name": "NASA",
//!       "upload_mode": "AUTO_FROM_DATE",
//!       "min_year_upload_auto": 2000,
//!       "source": { "feed_url": "https://feeds.example.org/nasa" },
//!       "policy": { "licence_templates": ["PD-USGov-NASA"] }
//!     }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use harvest_core::models::{MediaType, UploadMode};
use harvest_core::{HarvestError, HarvestResult, UploadPolicy};

use crate::organization::{default_permitted_types, Organization};
use crate::policy::{OrgPolicy, PolicyHooks};

/// Where the organization's media feed lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub feed_url: String,
    /// Environment variable holding a bearer token for the feed, if any.
    #[serde(default)]
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub upload_mode: UploadMode,
    #[serde(default)]
    pub min_year_upload_auto: i32,
    #[serde(default = "default_permitted_types")]
    pub permitted_types: BTreeSet<MediaType>,
    #[serde(default)]
    pub policy: OrgPolicy,
    #[serde(default)]
    pub source: Option<SourceDefinition>,
}

#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    organizations: Vec<OrgDefinition>,
}

impl OrgDefinition {
    /// Build the runtime organization, compiling its policy rules.
    pub fn build(&self) -> HarvestResult<Organization> {
        if self.id.trim().is_empty() {
            return Err(HarvestError::Configuration(
                "Organization id must not be empty".to_string(),
            ));
        }
        let hooks = PolicyHooks::new(self.policy.clone())?;
        Ok(Organization::new(
            self.id.clone(),
            self.name.clone(),
            UploadPolicy::new(self.upload_mode, self.min_year_upload_auto),
            Arc::new(hooks),
        )
        .with_permitted_types(self.permitted_types.iter().copied()))
    }
}

pub fn parse_definitions(json: &str) -> Result<Vec<OrgDefinition>> {
    let file: DefinitionsFile =
        serde_json::from_str(json).context("Failed to parse organization definitions")?;

    let mut seen = HashSet::new();
    for definition in &file.organizations {
        if !seen.insert(definition.id.as_str()) {
            bail!("Duplicate organization id '{}'", definition.id);
        }
    }

    Ok(file.organizations)
}

pub async fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<OrgDefinition>> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read organization definitions from {}", path.display()))?;
    let definitions = parse_definitions(&json)
        .with_context(|| format!("Invalid organization definitions in {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        count = definitions.len(),
        "Loaded organization definitions"
    );
    Ok(definitions)
}
