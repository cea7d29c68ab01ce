//! In-memory stores
//!
//! Same semantics as the PostgreSQL stores, without a database. Used by tests and
//! by database-less runs; state is lost when the process exits.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use harvest_core::models::{
    Media, MediaCountFilter, MediaId, Page, PageRequest, Problem, ProblemStatus,
};
use harvest_core::HarvestResult;

use crate::store::{MediaStore, ProblemStore};

#[derive(Clone, Default)]
pub struct InMemoryMediaStore {
    media: Arc<RwLock<BTreeMap<MediaId, Media>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.media.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.media.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn get(&self, id: &MediaId) -> HarvestResult<Option<Media>> {
        Ok(self.media.read().await.get(id).cloned())
    }

    async fn save(&self, media: &Media) -> HarvestResult<()> {
        self.media
            .write()
            .await
            .insert(media.id.clone(), media.clone());
        Ok(())
    }

    async fn delete(&self, id: &MediaId) -> HarvestResult<bool> {
        Ok(self.media.write().await.remove(id).is_some())
    }

    async fn list(&self, org_id: &str, page: PageRequest) -> HarvestResult<Page<Media>> {
        let media = self.media.read().await;
        let in_org: Vec<&Media> = media.values().filter(|m| m.id.org_id == org_id).collect();
        let total = in_org.len() as i64;
        let items = in_org
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn count(&self, org_id: &str, filter: MediaCountFilter) -> HarvestResult<i64> {
        let media = self.media.read().await;
        Ok(media
            .values()
            .filter(|m| m.id.org_id == org_id && filter.matches(m))
            .count() as i64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProblemStore {
    problems: Arc<RwLock<BTreeMap<MediaId, Problem>>>,
}

impl InMemoryProblemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.problems.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.problems.read().await.is_empty()
    }
}

#[async_trait]
impl ProblemStore for InMemoryProblemStore {
    async fn get(&self, key: &MediaId) -> HarvestResult<Option<Problem>> {
        Ok(self.problems.read().await.get(key).cloned())
    }

    async fn save(&self, problem: &Problem) -> HarvestResult<()> {
        let mut problems = self.problems.write().await;
        let key = problem.key();
        let mut stored = problem.clone();
        // the row id is stable across upserts, like ON CONFLICT DO UPDATE
        if let Some(existing) = problems.get(&key) {
            stored.id = existing.id;
        }
        problems.insert(key, stored);
        Ok(())
    }

    async fn delete(&self, key: &MediaId) -> HarvestResult<bool> {
        Ok(self.problems.write().await.remove(key).is_some())
    }

    async fn list(
        &self,
        org_id: &str,
        status: Option<ProblemStatus>,
        page: PageRequest,
    ) -> HarvestResult<Page<Problem>> {
        let problems = self.problems.read().await;
        let mut matching: Vec<&Problem> = problems
            .values()
            .filter(|p| p.org_id == org_id && status.map_or(true, |s| p.status == s))
            .collect();
        matching.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.media_id.cmp(&b.media_id))
        });
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn count_open(&self, org_id: &str) -> HarvestResult<i64> {
        let problems = self.problems.read().await;
        Ok(problems
            .values()
            .filter(|p| p.org_id == org_id && p.is_open())
            .count() as i64)
    }
}
