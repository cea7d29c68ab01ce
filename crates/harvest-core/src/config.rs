//! Configuration module
//!
//! Process-wide settings read once at startup from the environment (and `.env`).
//! Organization definitions live in a separate JSON file named by `ORGS_CONFIG_PATH`.

use std::env;

const DB_MAX_CONNECTIONS: u32 = 10;
const SCHEDULER_MAX_WORKERS: usize = 4;
const CYCLE_INTERVAL_SECS: u64 = 3600;
const FETCH_PAGE_SIZE: u32 = 50;
const UPLOAD_COOLDOWN_BASE_SECS: u64 = 300;
const UPLOAD_COOLDOWN_MAX_SECS: u64 = 86_400;
const UPLOAD_RATE_PER_SEC: f64 = 0.5;
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct HarvestConfig {
    pub environment: String,
    /// PostgreSQL connection string. When absent an in-memory store is used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub orgs_config_path: Option<String>,
    // Scheduler
    pub scheduler_max_workers: usize,
    pub cycle_interval_secs: u64,
    pub fetch_page_size: u32,
    // Upload dampening and throttling
    pub upload_cooldown_base_secs: u64,
    pub upload_cooldown_max_secs: u64,
    pub upload_rate_per_sec: f64,
    // Collaborators
    pub upload_gateway_url: Option<String>,
    pub upload_gateway_token: Option<String>,
    pub http_timeout_secs: u64,
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            environment: non_empty("ENVIRONMENT")
                .or_else(|| non_empty("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS)?,
            orgs_config_path: non_empty("ORGS_CONFIG_PATH"),
            scheduler_max_workers: parse_or(
                &lookup,
                "SCHEDULER_MAX_WORKERS",
                SCHEDULER_MAX_WORKERS,
            )?,
            cycle_interval_secs: parse_or(&lookup, "CYCLE_INTERVAL_SECS", CYCLE_INTERVAL_SECS)?,
            fetch_page_size: parse_or(&lookup, "FETCH_PAGE_SIZE", FETCH_PAGE_SIZE)?,
            upload_cooldown_base_secs: parse_or(
                &lookup,
                "UPLOAD_COOLDOWN_BASE_SECS",
                UPLOAD_COOLDOWN_BASE_SECS,
            )?,
            upload_cooldown_max_secs: parse_or(
                &lookup,
                "UPLOAD_COOLDOWN_MAX_SECS",
                UPLOAD_COOLDOWN_MAX_SECS,
            )?,
            upload_rate_per_sec: parse_or(&lookup, "UPLOAD_RATE_PER_SEC", UPLOAD_RATE_PER_SEC)?,
            upload_gateway_url: non_empty("UPLOAD_GATEWAY_URL"),
            upload_gateway_token: non_empty("UPLOAD_GATEWAY_TOKEN"),
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.scheduler_max_workers == 0 {
            return Err(anyhow::anyhow!("SCHEDULER_MAX_WORKERS must be at least 1"));
        }
        if self.cycle_interval_secs == 0 {
            return Err(anyhow::anyhow!("CYCLE_INTERVAL_SECS must be at least 1"));
        }
        if self.fetch_page_size == 0 {
            return Err(anyhow::anyhow!("FETCH_PAGE_SIZE must be at least 1"));
        }
        if self.upload_cooldown_base_secs > self.upload_cooldown_max_secs {
            return Err(anyhow::anyhow!(
                "UPLOAD_COOLDOWN_BASE_SECS ({}) cannot exceed UPLOAD_COOLDOWN_MAX_SECS ({})",
                self.upload_cooldown_base_secs,
                self.upload_cooldown_max_secs
            ));
        }
        if !(self.upload_rate_per_sec > 0.0) {
            return Err(anyhow::anyhow!("UPLOAD_RATE_PER_SEC must be positive"));
        }
        if self.is_production() && self.database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be set in production, the in-memory store loses state on restart"
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
