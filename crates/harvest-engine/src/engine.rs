//! Org Engine
//!
//! Drives one harvest cycle for one organization: fetch a page from the
//! source, merge and refresh every item, hash, run the organization's custom
//! processing, evaluate each file and upload the eligible ones. Items are
//! processed sequentially and committed one by one.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use harvest_core::models::{
    FileMetadata, Media, MediaId, ProblemKind, Statistics, DEFAULT_PAGE_SIZE,
};
use harvest_core::{HarvestConfig, HarvestResult};
use harvest_db::{MediaStore, ProblemStore};
use harvest_infra::RateLimiter;
use harvest_orgs::{OrgRegistry, Organization};

use crate::adapter::{Cursor, MediaSourceAdapter, RawMediaItem, RefreshOutcome};
use crate::cooldown::CooldownPolicy;
use crate::error::{CycleError, ItemError};
use crate::guard::{CycleGuard, CycleGuards};
use crate::hasher::MediaHasher;
use crate::merge::merge_raw;
use crate::report::{CycleOutcome, CycleReport};
use crate::statistics::StatisticsService;
use crate::tracker::ProblemTracker;
use crate::uploader::{UploadRequest, Uploader};
use crate::wikitext::{announcement, upload_filename, DescriptionPage};

/// Problem kinds a successful upload settles.
const UPLOAD_PROBLEM_KINDS: [ProblemKind; 3] = [
    ProblemKind::UploadConflict,
    ProblemKind::UploadFailure,
    ProblemKind::ProcessingFailure,
];

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub page_size: u32,
    pub cooldown: CooldownPolicy,
    pub upload_rate_per_sec: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cooldown: CooldownPolicy::default(),
            upload_rate_per_sec: 0.5,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            page_size: config.fetch_page_size,
            cooldown: CooldownPolicy::new(
                Duration::from_secs(config.upload_cooldown_base_secs),
                Duration::from_secs(config.upload_cooldown_max_secs),
            ),
            upload_rate_per_sec: config.upload_rate_per_sec,
        }
    }
}

pub struct OrgEngine {
    registry: OrgRegistry,
    adapters: HashMap<String, Arc<dyn MediaSourceAdapter>>,
    uploader: Arc<dyn Uploader>,
    hasher: Arc<dyn MediaHasher>,
    media_store: Arc<dyn MediaStore>,
    tracker: ProblemTracker,
    statistics: StatisticsService,
    guards: CycleGuards,
    cursors: Mutex<HashMap<String, Cursor>>,
    rate_limiter: RateLimiter,
    settings: EngineSettings,
}

impl OrgEngine {
    pub fn new(
        registry: OrgRegistry,
        media_store: Arc<dyn MediaStore>,
        problem_store: Arc<dyn ProblemStore>,
        uploader: Arc<dyn Uploader>,
        hasher: Arc<dyn MediaHasher>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            adapters: HashMap::new(),
            uploader,
            hasher,
            tracker: ProblemTracker::new(problem_store.clone()),
            statistics: StatisticsService::new(media_store.clone(), problem_store),
            media_store,
            guards: CycleGuards::new(),
            cursors: Mutex::new(HashMap::new()),
            rate_limiter: RateLimiter::new(settings.upload_rate_per_sec),
            settings,
        }
    }

    /// Attach the media source of an organization.
    pub fn with_adapter(
        mut self,
        org_id: impl Into<String>,
        adapter: Arc<dyn MediaSourceAdapter>,
    ) -> Self {
        self.adapters.insert(org_id.into(), adapter);
        self
    }

    pub fn registry(&self) -> &OrgRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &ProblemTracker {
        &self.tracker
    }

    pub fn statistics(&self) -> &StatisticsService {
        &self.statistics
    }

    pub fn media_store(&self) -> &Arc<dyn MediaStore> {
        &self.media_store
    }

    pub fn guards(&self) -> &CycleGuards {
        &self.guards
    }

    /// Take the organization's cycle guard without running anything.
    pub fn try_begin(&self, org_id: &str) -> Option<CycleGuard> {
        self.guards.try_acquire(org_id)
    }

    /// Live statistics for an organization.
    pub async fn current_statistics(&self, org_id: &str) -> Result<Statistics, CycleError> {
        let org = self.registry.get(org_id).await?;
        Ok(self.statistics.compute(&org.id, &org.name).await?)
    }

    fn adapter(&self, org_id: &str) -> Result<Arc<dyn MediaSourceAdapter>, CycleError> {
        self.adapters
            .get(org_id)
            .cloned()
            .ok_or_else(|| CycleError::AdapterMissing(org_id.to_string()))
    }

    /// Run one harvest cycle unless the organization already has one in flight.
    pub async fn update_media(
        &self,
        org_id: &str,
        is_manual: bool,
    ) -> Result<CycleOutcome, CycleError> {
        match self.try_begin(org_id) {
            Some(guard) => Ok(CycleOutcome::Completed(
                self.run_cycle(guard, is_manual).await?,
            )),
            None => {
                tracing::debug!(org_id, "Cycle already running, trigger dropped");
                Ok(CycleOutcome::AlreadyRunning)
            }
        }
    }

    /// Run a cycle under an already acquired guard. The guard is released when
    /// this returns, whatever the outcome.
    #[tracing::instrument(skip(self, guard), fields(org_id = %guard.org_id()))]
    pub async fn run_cycle(
        &self,
        guard: CycleGuard,
        is_manual: bool,
    ) -> Result<CycleReport, CycleError> {
        let org = self.registry.get(guard.org_id()).await?;
        let adapter = self.adapter(&org.id)?;
        let mut report = CycleReport::new(&org.id, is_manual);

        let cursor = self.cursors.lock().await.get(&org.id).cloned();
        tracing::debug!(cursor = ?cursor, page_size = self.settings.page_size, "Fetching page");

        match adapter.fetch(cursor.as_deref(), self.settings.page_size).await {
            Ok(page) => {
                report.fetched = page.items.len();
                for raw in &page.items {
                    match self
                        .process_item(&org, adapter.as_ref(), raw, is_manual, &mut report)
                        .await
                    {
                        Ok(()) => {}
                        Err(ItemError::Transient(e)) => {
                            report.skipped += 1;
                            tracing::warn!(media_id = %raw.id, error = %e, "Item skipped after transient failure");
                        }
                        Err(ItemError::Fatal(e)) => {
                            tracing::error!(media_id = %raw.id, error = %e, "Fatal source failure, aborting cycle");
                            return Err(CycleError::org_source(&org.id, e));
                        }
                        Err(ItemError::Store(e)) => {
                            tracing::error!(media_id = %raw.id, error = %e, "Store failure, aborting cycle");
                            return Err(e.into());
                        }
                    }
                }
                self.advance_cursor(&org.id, page.next_cursor).await;
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Fatal source failure while fetching, aborting cycle");
                return Err(CycleError::org_source(&org.id, e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transient failure while fetching, page skipped");
            }
        }

        report.statistics = Some(self.statistics.refresh(&org.id, &org.name).await?);
        report.log();
        drop(guard);
        Ok(report)
    }

    async fn advance_cursor(&self, org_id: &str, next: Option<Cursor>) {
        let mut cursors = self.cursors.lock().await;
        match next {
            Some(cursor) => {
                cursors.insert(org_id.to_string(), cursor);
            }
            None => {
                if cursors.remove(org_id).is_some() {
                    tracing::debug!(org_id, "Source exhausted, next cycle starts from the first page");
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(media_id = %raw.id))]
    async fn process_item(
        &self,
        org: &Organization,
        adapter: &dyn MediaSourceAdapter,
        raw: &RawMediaItem,
        is_manual: bool,
        report: &mut CycleReport,
    ) -> Result<(), ItemError> {
        let key = MediaId::new(org.id.clone(), raw.id.clone());
        let stored = self.media_store.get(&key).await?;
        let mut media = stored.clone().unwrap_or_else(|| Media::new(key.clone()));
        merge_raw(&mut media, raw);

        match adapter.refresh(&media).await? {
            RefreshOutcome::Found(current) => {
                merge_raw(&mut media, &current);
                self.tracker
                    .resolve_kinds(&key, &[ProblemKind::MissingUpstream])
                    .await?;
            }
            RefreshOutcome::NotFound => {
                self.tracker
                    .record(
                        &key,
                        ProblemKind::MissingUpstream,
                        "Media no longer available upstream",
                    )
                    .await?;
                report.problems_recorded += 1;
                Self::settle(report, stored.as_ref(), &mut media);
                self.media_store.save(&media).await?;
                return Ok(());
            }
        }

        // A fatal hash error concerns this asset only: it is recorded and the
        // file waits, unhashed, for the next cycle.
        let mut unhashable = Vec::new();
        for file in media.files.iter_mut().filter(|f| f.sha256.is_none()) {
            match self.hasher.hash(file).await {
                Ok(hashes) => file.apply_hashes(hashes),
                Err(e) if e.is_fatal() => {
                    tracing::warn!(asset_url = %file.asset_url, error = %e, "Asset cannot be hashed");
                    unhashable.push(format!("Cannot hash {}: {}", file.asset_url, e));
                }
                Err(e) => return Err(ItemError::Transient(e)),
            }
        }

        org.hooks.custom_processing(&mut media);

        Self::settle(report, stored.as_ref(), &mut media);
        self.media_store.save(&media).await?;
        if media.is_fully_ignored() {
            report.ignored += 1;
        }

        if !unhashable.is_empty() {
            self.tracker
                .record(&key, ProblemKind::ProcessingFailure, &unhashable.join("; "))
                .await?;
            report.problems_recorded += 1;
        }

        self.upload_files(org, &mut media, is_manual, report).await?;
        Ok(())
    }

    /// Count the commit. A media whose content ends up as stored keeps its
    /// `updated_at`, whatever the intermediate steps rewrote.
    fn settle(report: &mut CycleReport, stored: Option<&Media>, media: &mut Media) {
        match stored {
            None => report.created += 1,
            Some(before) if before.same_content(media) => media.updated_at = before.updated_at,
            Some(_) => {
                media.touch();
                report.updated += 1;
            }
        }
    }

    /// Evaluate every file of the media and upload the eligible ones.
    async fn upload_files(
        &self,
        org: &Organization,
        media: &mut Media,
        is_manual: bool,
        report: &mut CycleReport,
    ) -> HarvestResult<()> {
        let policy = org.upload_policy;
        let permitted = |f: &FileMetadata| org.is_permitted_file_type(f);

        for index in 0..media.files.len() {
            let file = media.files[index].clone();
            let eligible = if is_manual {
                policy.should_upload(media, &file, true, permitted)
            } else {
                policy.should_upload_auto(media, &file, false, permitted)
            };
            if !eligible {
                if !is_manual && policy.should_upload(media, &file, true, permitted) {
                    report.awaiting_manual += 1;
                }
                continue;
            }
            if !is_manual && file.sha256.is_none() {
                tracing::debug!(asset_url = %file.asset_url, "Not hashed yet, upload postponed");
                continue;
            }

            let licence_templates = org.hooks.find_licence_templates(media, &file);
            if licence_templates.is_empty() {
                self.tracker
                    .record(
                        &media.id,
                        ProblemKind::ProcessingFailure,
                        &format!("No licence template for {}", file.asset_url),
                    )
                    .await?;
                report.problems_recorded += 1;
                continue;
            }

            if !is_manual {
                if let Some(until) = self.settings.cooldown.held_until(&file, Utc::now()) {
                    tracing::debug!(
                        media_id = %media.id,
                        asset_url = %file.asset_url,
                        until = %until,
                        "Upload held back by cooldown"
                    );
                    report.deferred += 1;
                    continue;
                }
            }

            self.rate_limiter.acquire(&org.id).await;

            let categories = org.hooks.find_categories(media, &file, true);
            let author = org
                .hooks
                .get_author(media, &file)
                .unwrap_or_else(|| org.name.clone());
            let source_url = org.hooks.get_source_url(media, &file);
            let wikitext = DescriptionPage {
                media: &*media,
                author: &author,
                source_url: &source_url,
                licence_templates: &licence_templates,
                categories: &categories,
            }
            .render();
            let request = UploadRequest {
                media: media.clone(),
                filename: upload_filename(media, &file),
                file,
                wikitext,
                categories,
                licence_templates,
            };

            match self.uploader.upload(&request).await {
                Ok(target) => {
                    media.files[index].mark_uploaded(target.clone());
                    media.touch();
                    self.media_store.save(media).await?;
                    // a sibling still failing keeps the problem open
                    if !media.files.iter().any(FileMetadata::is_unsettled) {
                        self.tracker
                            .resolve_kinds(&media.id, &UPLOAD_PROBLEM_KINDS)
                            .await?;
                    }
                    report.uploaded += 1;

                    tracing::info!(
                        media_id = %media.id,
                        target_filename = %target,
                        announcement = %announcement(
                            media,
                            &target,
                            &org.hooks.get_emojis(media),
                            &org.hooks.get_twitter_accounts(media),
                        ),
                        "File uploaded"
                    );
                }
                Err(failure) => {
                    let kind = if failure.is_conflict() {
                        ProblemKind::UploadConflict
                    } else {
                        ProblemKind::UploadFailure
                    };
                    if kind == ProblemKind::UploadFailure {
                        media.files[index].record_upload_failure(Utc::now());
                        media.touch();
                        self.media_store.save(media).await?;
                    }
                    self.tracker
                        .record(&media.id, kind, &failure.to_string())
                        .await?;
                    report.problems_recorded += 1;
                }
            }
        }

        Ok(())
    }

    /// Manual upload of one stored media, without fetching. Shares the
    /// organization's cycle guard.
    #[tracing::instrument(skip(self), fields(media_id = %key))]
    pub async fn upload_media(&self, key: &MediaId) -> Result<CycleOutcome, CycleError> {
        let Some(guard) = self.try_begin(&key.org_id) else {
            tracing::debug!("Cycle already running, manual upload dropped");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let org = self.registry.get(&key.org_id).await?;
        let mut media = self
            .media_store
            .get(key)
            .await?
            .ok_or_else(|| CycleError::MediaNotFound(key.clone()))?;

        let mut report = CycleReport::new(&org.id, true);
        self.upload_files(&org, &mut media, true, &mut report).await?;

        report.statistics = Some(self.statistics.refresh(&org.id, &org.name).await?);
        report.log();
        drop(guard);
        Ok(CycleOutcome::Completed(report))
    }
}
