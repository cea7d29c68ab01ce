//! PostgreSQL stores
//!
//! Files are kept as a JSONB array on the media row; statistics are computed
//! with `COUNT(*)` over JSONB predicates, never from cached counters.

mod media;
mod problem;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub use media::PgMediaStore;
pub use problem::PgProblemStore;

const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Open a connection pool and apply pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(max_connections, "Database pool ready, migrations applied");
    Ok(pool)
}
