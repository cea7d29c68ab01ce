//! Harvest Infrastructure Library
//!
//! Shared infrastructure components used by the engine and the binaries:
//! - Telemetry initialization
//! - Upload rate limiting

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};

#[cfg(feature = "rate-limit")]
pub use rate_limit::RateLimiter;
