//! Upload cooldown
//!
//! A file whose upload keeps being rejected is retried less and less often.
//! The state lives on the file itself, so one failing file never holds back
//! its siblings. Manual runs ignore the cooldown.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use harvest_core::models::FileMetadata;

pub const DEFAULT_COOLDOWN_BASE_SECS: u64 = 300;
pub const DEFAULT_COOLDOWN_MAX_SECS: u64 = 86_400;

/// Exponential back-off applied per file after rejected uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(DEFAULT_COOLDOWN_BASE_SECS),
            max: Duration::from_secs(DEFAULT_COOLDOWN_MAX_SECS),
        }
    }
}

impl CooldownPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// `base * 2^(failures - 1)`, capped at `max`.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(2_u32.pow(exponent))
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// When the file may next be uploaded by a scheduled run, if it is still
    /// cooling down at `now`.
    pub fn held_until(&self, file: &FileMetadata, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if file.upload_failures == 0 {
            return None;
        }
        let last = file.last_upload_failure_at?;
        let delay = ChronoDuration::from_std(self.delay(file.upload_failures))
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_COOLDOWN_MAX_SECS as i64));
        let until = last + delay;
        (now < until).then_some(until)
    }
}
