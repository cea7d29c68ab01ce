//! Token-bucket rate limiting keyed by organization.
//!
//! Every organization gets its own bucket so a busy organization never starves
//! the others of upload capacity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let seconds = (1.0 - self.tokens) / self.refill_rate;
            Duration::from_secs_f64(seconds.max(0.0))
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    rate_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    /// `rate_per_sec` must be positive; burst capacity is twice the rate, at least one token.
    pub fn new(rate_per_sec: f64) -> Self {
        Self::with_burst(rate_per_sec, (rate_per_sec * 2.0).max(1.0))
    }

    pub fn with_burst(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate_per_sec,
            burst: burst.max(1.0),
        }
    }

    /// Acquire a token for the key, waiting until one is available.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait_duration = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(key.to_string())
                    .or_insert_with(|| TokenBucket::new(self.burst, self.rate_per_sec));

                if bucket.try_acquire() {
                    tracing::trace!(
                        key,
                        tokens_remaining = bucket.tokens,
                        "Rate limit token acquired"
                    );
                    return;
                }

                bucket.time_until_next_token()
            };

            if wait_duration > Duration::ZERO {
                tracing::debug!(
                    key,
                    wait_ms = wait_duration.as_millis() as u64,
                    "Rate limit reached, waiting for token"
                );
                tokio::time::sleep(wait_duration).await;
            }
        }
    }

    /// Try to acquire a token without waiting.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, self.rate_per_sec))
            .try_acquire()
    }
}
