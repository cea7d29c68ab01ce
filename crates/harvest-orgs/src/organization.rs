use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use harvest_core::models::{FileMetadata, MediaType};
use harvest_core::UploadPolicy;

use crate::hooks::OrgHooks;

/// Media types uploaded when an organization does not restrict them.
pub fn default_permitted_types() -> BTreeSet<MediaType> {
    [MediaType::Image, MediaType::Video].into_iter().collect()
}

/// A configured media-publishing organization.
#[derive(Clone)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub upload_policy: UploadPolicy,
    pub permitted_types: BTreeSet<MediaType>,
    pub hooks: Arc<dyn OrgHooks>,
}

impl Organization {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        upload_policy: UploadPolicy,
        hooks: Arc<dyn OrgHooks>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            upload_policy,
            permitted_types: default_permitted_types(),
            hooks,
        }
    }

    pub fn with_permitted_types(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.permitted_types = types.into_iter().collect();
        self
    }

    /// Files whose type cannot be resolved are never permitted.
    pub fn is_permitted_file_type(&self, file: &FileMetadata) -> bool {
        file.resolved_media_type()
            .is_some_and(|t| self.permitted_types.contains(&t))
    }
}

impl fmt::Debug for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Organization")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("upload_policy", &self.upload_policy)
            .field("permitted_types", &self.permitted_types)
            .finish_non_exhaustive()
    }
}
