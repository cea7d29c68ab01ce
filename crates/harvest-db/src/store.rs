//! Store traits
//!
//! The narrow persistence contract the engine depends on: keyed get/save/delete,
//! paginated listing and counting predicates. Implementations must be safe for
//! concurrent use by cycles of different organizations.

use async_trait::async_trait;
use harvest_core::models::{
    Media, MediaCountFilter, MediaId, Page, PageRequest, Problem, ProblemStatus,
};
use harvest_core::HarvestResult;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn get(&self, id: &MediaId) -> HarvestResult<Option<Media>>;

    /// Insert or replace the media stored under `media.id`.
    async fn save(&self, media: &Media) -> HarvestResult<()>;

    /// Manual removal. Returns whether a row was deleted.
    async fn delete(&self, id: &MediaId) -> HarvestResult<bool>;

    /// Media of one organization ordered by source id.
    async fn list(&self, org_id: &str, page: PageRequest) -> HarvestResult<Page<Media>>;

    async fn count(&self, org_id: &str, filter: MediaCountFilter) -> HarvestResult<i64>;
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get(&self, key: &MediaId) -> HarvestResult<Option<Problem>>;

    /// Insert or replace the problem stored under its organization + media key.
    async fn save(&self, problem: &Problem) -> HarvestResult<()>;

    async fn delete(&self, key: &MediaId) -> HarvestResult<bool>;

    /// Problems of one organization, most recently seen first.
    async fn list(
        &self,
        org_id: &str,
        status: Option<ProblemStatus>,
        page: PageRequest,
    ) -> HarvestResult<Page<Problem>>;

    async fn count_open(&self, org_id: &str) -> HarvestResult<i64>;
}
