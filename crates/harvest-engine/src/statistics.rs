//! Per-organization statistics
//!
//! Counts always come from live store queries. The service keeps the latest
//! snapshot per organization so readers do not have to recount.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use harvest_core::models::{MediaCountFilter, Statistics};
use harvest_core::HarvestResult;
use harvest_db::{MediaStore, ProblemStore};

#[derive(Clone)]
pub struct StatisticsService {
    media_store: Arc<dyn MediaStore>,
    problem_store: Arc<dyn ProblemStore>,
    snapshots: Arc<RwLock<HashMap<String, Statistics>>>,
}

impl StatisticsService {
    pub fn new(media_store: Arc<dyn MediaStore>, problem_store: Arc<dyn ProblemStore>) -> Self {
        Self {
            media_store,
            problem_store,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Count everything for the organization without touching the snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn compute(&self, org_id: &str, org_name: &str) -> HarvestResult<Statistics> {
        let mut stats = Statistics {
            org_id: org_id.to_string(),
            org_name: org_name.to_string(),
            ..Default::default()
        };

        for filter in MediaCountFilter::ALL {
            let count = self.media_store.count(org_id, filter).await?;
            let slot = match filter {
                MediaCountFilter::All => &mut stats.total_media,
                MediaCountFilter::Missing => &mut stats.missing_media,
                MediaCountFilter::MissingImages => &mut stats.missing_images,
                MediaCountFilter::MissingVideos => &mut stats.missing_videos,
                MediaCountFilter::Uploaded => &mut stats.uploaded_media,
                MediaCountFilter::Ignored => &mut stats.ignored_media,
                MediaCountFilter::Hashed => &mut stats.hashed_media,
            };
            *slot = count;
        }
        stats.open_problems = self.problem_store.count_open(org_id).await?;

        Ok(stats)
    }

    /// Recount and replace the organization's snapshot.
    pub async fn refresh(&self, org_id: &str, org_name: &str) -> HarvestResult<Statistics> {
        let stats = self.compute(org_id, org_name).await?;
        self.snapshots
            .write()
            .await
            .insert(org_id.to_string(), stats.clone());

        tracing::debug!(
            org_id,
            total = stats.total_media,
            missing = stats.missing_media,
            uploaded = stats.uploaded_media,
            ignored = stats.ignored_media,
            open_problems = stats.open_problems,
            "Statistics refreshed"
        );
        Ok(stats)
    }

    /// Snapshot taken at the end of the organization's last cycle.
    pub async fn latest(&self, org_id: &str) -> Option<Statistics> {
        self.snapshots.read().await.get(org_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::models::{FileMetadata, Media, MediaId, Problem, ProblemKind};
    use harvest_db::{InMemoryMediaStore, InMemoryProblemStore};

    async fn seed(media_store: &InMemoryMediaStore) {
        let mut missing = Media::new(MediaId::new("nasa", "1"));
        missing.files = vec![FileMetadata::new("https://x.org/1.jpg")];

        let mut uploaded = Media::new(MediaId::new("nasa", "2"));
        let mut file = FileMetadata::new("https://x.org/2.mp4");
        file.target_filenames.insert("File:Two.mp4".to_string());
        file.phash = Some("ff00".to_string());
        uploaded.files = vec![file];

        let mut ignored = Media::new(MediaId::new("nasa", "3"));
        let mut file = FileMetadata::new("https://x.org/3.jpg");
        file.ignore("block list");
        ignored.files = vec![file];

        let mut other_org = Media::new(MediaId::new("esa", "1"));
        other_org.files = vec![FileMetadata::new("https://x.org/e.jpg")];

        for media in [missing, uploaded, ignored, other_org] {
            media_store.save(&media).await.unwrap();
        }
    }

    #[tokio::test]
    async fn computes_every_count() {
        let media_store = InMemoryMediaStore::new();
        let problem_store = InMemoryProblemStore::new();
        seed(&media_store).await;
        problem_store
            .save(&Problem::new(
                &MediaId::new("nasa", "1"),
                ProblemKind::UploadFailure,
                "quota",
            ))
            .await
            .unwrap();

        let service = StatisticsService::new(Arc::new(media_store), Arc::new(problem_store));
        let stats = service.compute("nasa", "NASA").await.unwrap();

        assert_eq!(stats.total_media, 3);
        assert_eq!(stats.missing_media, 1);
        assert_eq!(stats.missing_images, 1);
        assert_eq!(stats.missing_videos, 0);
        assert_eq!(stats.uploaded_media, 1);
        assert_eq!(stats.ignored_media, 1);
        assert_eq!(stats.hashed_media, 1);
        assert_eq!(stats.open_problems, 1);
        assert!(service.latest("nasa").await.is_none());
    }

    #[tokio::test]
    async fn refresh_stores_snapshot() {
        let media_store = InMemoryMediaStore::new();
        seed(&media_store).await;
        let service = StatisticsService::new(
            Arc::new(media_store),
            Arc::new(InMemoryProblemStore::new()),
        );

        let stats = service.refresh("esa", "ESA").await.unwrap();
        assert_eq!(stats.total_media, 1);
        assert_eq!(service.latest("esa").await, Some(stats));
    }
}
