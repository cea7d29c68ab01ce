//! Cycle runner trait
//!
//! The scheduler only needs three things from the engine: take an
//! organization's guard, run a cycle under it, and list the organizations to
//! trigger periodically. [`OrgEngine`] is the production implementation.

use async_trait::async_trait;

use harvest_engine::{CycleError, CycleGuard, CycleReport, OrgEngine};

#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Take the organization's in-flight guard, or `None` if a cycle holds it.
    fn try_begin(&self, org_id: &str) -> Option<CycleGuard>;

    /// Run one cycle. The guard is released when the cycle ends.
    async fn run(&self, guard: CycleGuard, is_manual: bool) -> Result<CycleReport, CycleError>;

    /// Organizations the periodic loop triggers.
    async fn organization_ids(&self) -> Vec<String>;
}

#[async_trait]
impl CycleRunner for OrgEngine {
    fn try_begin(&self, org_id: &str) -> Option<CycleGuard> {
        OrgEngine::try_begin(self, org_id)
    }

    async fn run(&self, guard: CycleGuard, is_manual: bool) -> Result<CycleReport, CycleError> {
        self.run_cycle(guard, is_manual).await
    }

    async fn organization_ids(&self) -> Vec<String> {
        self.registry().ids().await
    }
}
