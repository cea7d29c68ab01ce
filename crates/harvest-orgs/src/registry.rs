//! Registry of configured organizations

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use harvest_core::{HarvestError, HarvestResult};

use crate::definition::OrgDefinition;
use crate::organization::Organization;

/// Registry for looking up organizations by id.
///
/// Cheap to clone; clones share the same map. Reads never block each other,
/// registration is serialized.
#[derive(Clone, Default)]
pub struct OrgRegistry {
    organizations: Arc<RwLock<HashMap<String, Arc<Organization>>>>,
}

impl OrgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every definition and register the result.
    pub async fn from_definitions(definitions: &[OrgDefinition]) -> HarvestResult<Self> {
        let registry = Self::new();
        for definition in definitions {
            registry.register(definition.build()?).await;
        }
        Ok(registry)
    }

    /// Register an organization, replacing any previous one with the same id.
    pub async fn register(&self, organization: Organization) {
        let mut organizations = self.organizations.write().await;
        if organizations.contains_key(&organization.id) {
            tracing::warn!(org_id = %organization.id, "Replacing registered organization");
        }
        organizations.insert(organization.id.clone(), Arc::new(organization));
    }

    pub async fn get(&self, org_id: &str) -> HarvestResult<Arc<Organization>> {
        let organizations = self.organizations.read().await;

        organizations
            .get(org_id)
            .cloned()
            .ok_or_else(|| HarvestError::OrganizationNotFound(org_id.to_string()))
    }

    /// All organizations, sorted by id.
    pub async fn list(&self) -> Vec<Arc<Organization>> {
        let organizations = self.organizations.read().await;
        let mut list: Vec<_> = organizations.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub async fn ids(&self) -> Vec<String> {
        self.list().await.iter().map(|o| o.id.clone()).collect()
    }

    pub async fn contains(&self, org_id: &str) -> bool {
        self.organizations.read().await.contains_key(org_id)
    }

    pub async fn len(&self) -> usize {
        self.organizations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.organizations.read().await.is_empty()
    }
}
