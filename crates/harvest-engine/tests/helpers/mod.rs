//! Test helpers: stub collaborators and an engine wired to in-memory stores.
//!
//! Run from workspace root: `cargo test -p harvest-engine --test cycle_test`.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use harvest_core::models::{FileHashes, FileMetadata, Media, MediaType, UploadMode};
use harvest_core::{SourceError, UploadPolicy};
use harvest_db::{InMemoryMediaStore, InMemoryProblemStore};
use harvest_engine::{
    EngineSettings, FetchPage, MediaHasher, MediaSourceAdapter, OrgEngine, RawFile, RawMediaItem,
    RefreshOutcome, UploadFailure, UploadRequest, Uploader,
};
use harvest_orgs::{OrgPolicy, OrgRegistry, Organization, PolicyHooks};

pub const ORG_ID: &str = "nasa";

/// Source serving a fixed listing, paginated by index cursors.
#[derive(Default)]
pub struct StubAdapter {
    pub items: Mutex<Vec<RawMediaItem>>,
    pub missing: Mutex<HashSet<String>>,
    pub transient_refresh: Mutex<HashSet<String>>,
    pub fetch_error: Mutex<Option<bool>>,
    pub delay: Option<Duration>,
    pub fetch_cursors: Mutex<Vec<Option<String>>>,
}

impl StubAdapter {
    pub fn with_items(items: Vec<RawMediaItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    pub fn slow(items: Vec<RawMediaItem>, delay: Duration) -> Self {
        Self {
            items: Mutex::new(items),
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn mark_missing(&self, id: &str) {
        self.missing.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_refresh_transiently(&self, id: &str) {
        self.transient_refresh.lock().unwrap().insert(id.to_string());
    }

    /// `Some(true)` fails every fetch fatally, `Some(false)` transiently.
    pub fn fail_fetch(&self, fatal: Option<bool>) {
        *self.fetch_error.lock().unwrap() = fatal;
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.fetch_cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSourceAdapter for StubAdapter {
    async fn fetch(&self, cursor: Option<&str>, page_size: u32) -> Result<FetchPage, SourceError> {
        self.fetch_cursors
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let fetch_error = *self.fetch_error.lock().unwrap();
        match fetch_error {
            Some(true) => return Err(SourceError::fatal(anyhow!("invalid credentials"))),
            Some(false) => return Err(SourceError::transient(anyhow!("timeout"))),
            None => {}
        }

        let items = self.items.lock().unwrap();
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + page_size as usize).min(items.len());
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(FetchPage {
            items: items[start.min(end)..end].to_vec(),
            next_cursor,
        })
    }

    async fn refresh(&self, media: &Media) -> Result<RefreshOutcome, SourceError> {
        let id = &media.id.media_id;
        if self.transient_refresh.lock().unwrap().contains(id) {
            return Err(SourceError::transient(anyhow!("connection reset")));
        }
        if self.missing.lock().unwrap().contains(id) {
            return Ok(RefreshOutcome::NotFound);
        }
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .map(RefreshOutcome::Found)
            .unwrap_or(RefreshOutcome::NotFound))
    }
}

/// Uploader accepting everything unless told to fail.
#[derive(Default)]
pub struct StubUploader {
    pub requests: Mutex<Vec<UploadRequest>>,
    pub failure: Mutex<Option<UploadFailure>>,
    pub asset_failures: Mutex<HashMap<String, UploadFailure>>,
}

impl StubUploader {
    pub fn fail_with(&self, failure: Option<UploadFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Reject only the given asset; other uploads follow `fail_with`.
    pub fn fail_asset(&self, asset_url: &str, failure: UploadFailure) {
        self.asset_failures
            .lock()
            .unwrap()
            .insert(asset_url.to_string(), failure);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.filename.clone())
            .collect()
    }
}

#[async_trait]
impl Uploader for StubUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadFailure> {
        self.requests.lock().unwrap().push(request.clone());
        let asset_failure = self
            .asset_failures
            .lock()
            .unwrap()
            .get(&request.file.asset_url)
            .cloned();
        match asset_failure.or_else(|| self.failure.lock().unwrap().clone()) {
            Some(failure) => Err(failure),
            None => Ok(format!("File:{}", request.filename)),
        }
    }
}

#[derive(Default)]
pub struct StubHasher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MediaHasher for StubHasher {
    async fn hash(&self, file: &FileMetadata) -> Result<FileHashes, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FileHashes {
            sha256: Some(format!("sha-{}", file.asset_url)),
            phash: Some("8f8f8f8f".to_string()),
        })
    }
}

pub fn raw_item(id: &str, year: Option<i32>, urls: &[&str]) -> RawMediaItem {
    let mut item = RawMediaItem::new(id);
    item.title = Some(format!("Item {}", id));
    item.publication_year = year;
    item.files = urls.iter().map(|url| RawFile::new(*url)).collect();
    item
}

pub fn nasa_policy() -> OrgPolicy {
    OrgPolicy {
        author: Some("NASA".to_string()),
        licence_templates: vec!["PD-USGov-NASA".to_string()],
        categories: vec!["Photos by NASA".to_string()],
        ..Default::default()
    }
}

pub fn organization(mode: UploadMode, min_year: i32, policy: OrgPolicy) -> Organization {
    Organization::new(
        ORG_ID,
        "NASA",
        UploadPolicy::new(mode, min_year),
        Arc::new(PolicyHooks::new(policy).unwrap()),
    )
    .with_permitted_types([MediaType::Image, MediaType::Video])
}

pub struct Harness {
    pub engine: Arc<OrgEngine>,
    pub media_store: InMemoryMediaStore,
    pub problem_store: InMemoryProblemStore,
    pub adapter: Arc<StubAdapter>,
    pub uploader: Arc<StubUploader>,
    pub hasher: Arc<StubHasher>,
}

pub async fn harness(org: Organization, adapter: StubAdapter) -> Harness {
    harness_with(org, adapter, EngineSettings::default()).await
}

pub async fn harness_with(
    org: Organization,
    adapter: StubAdapter,
    settings: EngineSettings,
) -> Harness {
    build_harness(org, adapter, settings, None).await
}

/// Harness whose engine hashes with `hasher` instead of the stub.
pub async fn harness_hashing_with(
    org: Organization,
    adapter: StubAdapter,
    hasher: Arc<dyn MediaHasher>,
) -> Harness {
    build_harness(org, adapter, EngineSettings::default(), Some(hasher)).await
}

async fn build_harness(
    org: Organization,
    adapter: StubAdapter,
    settings: EngineSettings,
    engine_hasher: Option<Arc<dyn MediaHasher>>,
) -> Harness {
    let registry = OrgRegistry::new();
    let org_id = org.id.clone();
    registry.register(org).await;

    let media_store = InMemoryMediaStore::new();
    let problem_store = InMemoryProblemStore::new();
    let adapter = Arc::new(adapter);
    let uploader = Arc::new(StubUploader::default());
    let hasher = Arc::new(StubHasher::default());

    let settings = EngineSettings {
        upload_rate_per_sec: 1000.0,
        ..settings
    };
    let engine = OrgEngine::new(
        registry,
        Arc::new(media_store.clone()),
        Arc::new(problem_store.clone()),
        uploader.clone(),
        engine_hasher.unwrap_or_else(|| hasher.clone() as Arc<dyn MediaHasher>),
        settings,
    )
    .with_adapter(org_id, adapter.clone());

    Harness {
        engine: Arc::new(engine),
        media_store,
        problem_store,
        adapter,
        uploader,
        hasher,
    }
}
