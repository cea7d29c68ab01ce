//! Problem tracker
//!
//! Records anomalies for human review (one problem per media) and implements
//! the manual review actions.

use std::sync::Arc;

use harvest_core::models::{MediaId, Page, PageRequest, Problem, ProblemKind, ProblemStatus};
use harvest_core::{HarvestError, HarvestResult};
use harvest_db::ProblemStore;

#[derive(Clone)]
pub struct ProblemTracker {
    store: Arc<dyn ProblemStore>,
}

impl ProblemTracker {
    pub fn new(store: Arc<dyn ProblemStore>) -> Self {
        Self { store }
    }

    /// Record an occurrence, creating the problem or updating the existing one.
    #[tracing::instrument(skip(self, message), fields(media_id = %key, kind = %kind))]
    pub async fn record(
        &self,
        key: &MediaId,
        kind: ProblemKind,
        message: &str,
    ) -> HarvestResult<Problem> {
        let problem = match self.store.get(key).await? {
            Some(mut existing) => {
                existing.recur(kind, message);
                existing
            }
            None => Problem::new(key, kind, message),
        };
        self.store.save(&problem).await?;

        tracing::warn!(
            occurrences = problem.occurrences,
            error = %message,
            "Problem recorded"
        );
        Ok(problem)
    }

    /// Resolve the media's problem if it is unresolved and of one of `kinds`.
    /// Returns whether a problem was resolved.
    pub async fn resolve_kinds(&self, key: &MediaId, kinds: &[ProblemKind]) -> HarvestResult<bool> {
        match self.store.get(key).await? {
            Some(mut problem)
                if problem.status != ProblemStatus::Resolved && kinds.contains(&problem.kind) =>
            {
                problem.status = ProblemStatus::Resolved;
                self.store.save(&problem).await?;
                tracing::info!(media_id = %key, kind = %problem.kind, "Problem resolved");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn get(&self, key: &MediaId) -> HarvestResult<Option<Problem>> {
        self.store.get(key).await
    }

    pub async fn list(
        &self,
        org_id: &str,
        status: Option<ProblemStatus>,
        page: PageRequest,
    ) -> HarvestResult<Page<Problem>> {
        self.store.list(org_id, status, page).await
    }

    pub async fn count_open(&self, org_id: &str) -> HarvestResult<i64> {
        self.store.count_open(org_id).await
    }

    async fn set_status(&self, key: &MediaId, status: ProblemStatus) -> HarvestResult<Problem> {
        let mut problem = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| HarvestError::NotFound(format!("Problem for media {}", key)))?;
        problem.status = status;
        self.store.save(&problem).await?;

        tracing::info!(media_id = %key, status = %status, "Problem status changed");
        Ok(problem)
    }

    /// Acknowledge a problem without resolving it.
    pub async fn mark_reviewed(&self, key: &MediaId) -> HarvestResult<Problem> {
        self.set_status(key, ProblemStatus::Reviewed).await
    }

    pub async fn resolve(&self, key: &MediaId) -> HarvestResult<Problem> {
        self.set_status(key, ProblemStatus::Resolved).await
    }

    /// Manual deletion. The automated cycle never deletes problems.
    pub async fn delete(&self, key: &MediaId) -> HarvestResult<bool> {
        let deleted = self.store.delete(key).await?;
        if deleted {
            tracing::info!(media_id = %key, "Problem deleted");
        }
        Ok(deleted)
    }
}
