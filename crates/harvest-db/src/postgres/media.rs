use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};

use harvest_core::models::{
    FileMetadata, Media, MediaCountFilter, MediaId, Page, PageRequest,
};
use harvest_core::HarvestResult;

use crate::store::MediaStore;

#[derive(FromRow)]
struct MediaRow {
    org_id: String,
    media_id: String,
    title: Option<String>,
    description: Option<String>,
    publication_date: Option<NaiveDate>,
    publication_year: Option<i32>,
    files: Json<Vec<FileMetadata>>,
    fetched_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MediaRow> for Media {
    fn from(row: MediaRow) -> Self {
        Media {
            id: MediaId::new(row.org_id, row.media_id),
            title: row.title,
            description: row.description,
            publication_date: row.publication_date,
            publication_year: row.publication_year,
            files: row.files.0,
            fetched_at: row.fetched_at,
            updated_at: row.updated_at,
        }
    }
}

const MEDIA_COLUMNS: &str = "org_id, media_id, title, description, publication_date, \
     publication_year, files, fetched_at, updated_at";

/// SQL predicate over `m.files` matching [`MediaCountFilter::matches`].
fn filter_clause(filter: MediaCountFilter) -> &'static str {
    match filter {
        MediaCountFilter::All => "TRUE",
        MediaCountFilter::Missing => {
            "EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE NOT COALESCE((f->>'ignored')::boolean, false) \
             AND jsonb_array_length(COALESCE(f->'target_filenames', '[]'::jsonb)) = 0)"
        }
        MediaCountFilter::MissingImages => {
            "EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE NOT COALESCE((f->>'ignored')::boolean, false) \
             AND jsonb_array_length(COALESCE(f->'target_filenames', '[]'::jsonb)) = 0 \
             AND f->>'media_type' = 'image')"
        }
        MediaCountFilter::MissingVideos => {
            "EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE NOT COALESCE((f->>'ignored')::boolean, false) \
             AND jsonb_array_length(COALESCE(f->'target_filenames', '[]'::jsonb)) = 0 \
             AND f->>'media_type' = 'video')"
        }
        MediaCountFilter::Uploaded => {
            "EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE jsonb_array_length(COALESCE(f->'target_filenames', '[]'::jsonb)) > 0)"
        }
        MediaCountFilter::Ignored => {
            "jsonb_array_length(m.files) > 0 \
             AND NOT EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE NOT COALESCE((f->>'ignored')::boolean, false))"
        }
        MediaCountFilter::Hashed => {
            "EXISTS (SELECT 1 FROM jsonb_array_elements(m.files) f \
             WHERE f->>'phash' IS NOT NULL)"
        }
    }
}

#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for PgMediaStore {
    #[tracing::instrument(skip(self), fields(media_id = %id))]
    async fn get(&self, id: &MediaId) -> HarvestResult<Option<Media>> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE org_id = $1 AND media_id = $2"
        ))
        .bind(&id.org_id)
        .bind(&id.media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Media::from))
    }

    #[tracing::instrument(skip(self, media), fields(media_id = %media.id))]
    async fn save(&self, media: &Media) -> HarvestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO media (
                org_id, media_id, title, description, publication_date,
                publication_year, files, fetched_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (org_id, media_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                publication_date = EXCLUDED.publication_date,
                publication_year = EXCLUDED.publication_year,
                files = EXCLUDED.files,
                fetched_at = EXCLUDED.fetched_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&media.id.org_id)
        .bind(&media.id.media_id)
        .bind(&media.title)
        .bind(&media.description)
        .bind(media.publication_date)
        .bind(media.publication_year)
        .bind(Json(&media.files))
        .bind(media.fetched_at)
        .bind(media.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, media_id = %media.id, "Failed to save media");
            e
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(media_id = %id))]
    async fn delete(&self, id: &MediaId) -> HarvestResult<bool> {
        let result = sqlx::query("DELETE FROM media WHERE org_id = $1 AND media_id = $2")
            .bind(&id.org_id)
            .bind(&id.media_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!(media_id = %id, "Media deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, org_id: &str, page: PageRequest) -> HarvestResult<Page<Media>> {
        let rows = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE org_id = $1 \
             ORDER BY media_id LIMIT $2 OFFSET $3"
        ))
        .bind(org_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = self.count(org_id, MediaCountFilter::All).await?;
        Ok(Page::new(
            rows.into_iter().map(Media::from).collect(),
            page,
            total,
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self, org_id: &str, filter: MediaCountFilter) -> HarvestResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM media m WHERE m.org_id = $1 AND {}",
            filter_clause(filter)
        ))
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
