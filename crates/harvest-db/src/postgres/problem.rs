use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use harvest_core::models::{
    MediaId, Page, PageRequest, Problem, ProblemKind, ProblemStatus,
};
use harvest_core::HarvestResult;

use crate::store::ProblemStore;

#[derive(FromRow)]
struct ProblemRow {
    id: Uuid,
    org_id: String,
    media_id: String,
    kind: ProblemKind,
    error_message: String,
    status: ProblemStatus,
    occurrences: i32,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl From<ProblemRow> for Problem {
    fn from(row: ProblemRow) -> Self {
        Problem {
            id: row.id,
            org_id: row.org_id,
            media_id: row.media_id,
            kind: row.kind,
            error_message: row.error_message,
            status: row.status,
            occurrences: row.occurrences,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

const PROBLEM_COLUMNS: &str = "id, org_id, media_id, kind, error_message, status, \
     occurrences, first_seen_at, last_seen_at";

#[derive(Clone)]
pub struct PgProblemStore {
    pool: PgPool,
}

impl PgProblemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProblemStore for PgProblemStore {
    #[tracing::instrument(skip(self), fields(media_id = %key))]
    async fn get(&self, key: &MediaId) -> HarvestResult<Option<Problem>> {
        let row = sqlx::query_as::<Postgres, ProblemRow>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems WHERE org_id = $1 AND media_id = $2"
        ))
        .bind(&key.org_id)
        .bind(&key.media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Problem::from))
    }

    #[tracing::instrument(skip(self, problem), fields(org_id = %problem.org_id, media_id = %problem.media_id))]
    async fn save(&self, problem: &Problem) -> HarvestResult<()> {
        sqlx::query(
            r#"
            INSERT INTO problems (
                id, org_id, media_id, kind, error_message, status,
                occurrences, first_seen_at, last_seen_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (org_id, media_id) DO UPDATE SET
                kind = EXCLUDED.kind,
                error_message = EXCLUDED.error_message,
                status = EXCLUDED.status,
                occurrences = EXCLUDED.occurrences,
                first_seen_at = EXCLUDED.first_seen_at,
                last_seen_at = EXCLUDED.last_seen_at
            "#,
        )
        .bind(problem.id)
        .bind(&problem.org_id)
        .bind(&problem.media_id)
        .bind(problem.kind)
        .bind(&problem.error_message)
        .bind(problem.status)
        .bind(problem.occurrences)
        .bind(problem.first_seen_at)
        .bind(problem.last_seen_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                org_id = %problem.org_id,
                media_id = %problem.media_id,
                "Failed to save problem"
            );
            e
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(media_id = %key))]
    async fn delete(&self, key: &MediaId) -> HarvestResult<bool> {
        let result = sqlx::query("DELETE FROM problems WHERE org_id = $1 AND media_id = $2")
            .bind(&key.org_id)
            .bind(&key.media_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        org_id: &str,
        status: Option<ProblemStatus>,
        page: PageRequest,
    ) -> HarvestResult<Page<Problem>> {
        let rows = sqlx::query_as::<Postgres, ProblemRow>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM problems \
             WHERE org_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY last_seen_at DESC, media_id \
             LIMIT $3 OFFSET $4"
        ))
        .bind(org_id)
        .bind(status.map(|s| s.to_string()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM problems WHERE org_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(org_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_one(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(Problem::from).collect(),
            page,
            total,
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn count_open(&self, org_id: &str) -> HarvestResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM problems WHERE org_id = $1 AND status = $2")
                .bind(org_id)
                .bind(ProblemStatus::Open)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
