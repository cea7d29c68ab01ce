//! Harvest Engine
//!
//! The per-organization harvest cycle and everything it needs around it:
//! collaborator contracts (source adapter, uploader, hasher) with generic HTTP
//! implementations, the in-flight guard, per-file upload cooldowns, problem
//! tracking, statistics and the upload description builder.

pub mod adapter;
pub mod clients;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod guard;
pub mod hasher;
pub mod merge;
pub mod report;
pub mod statistics;
pub mod tracker;
pub mod uploader;
pub mod wikitext;

pub use adapter::{Cursor, FetchPage, MediaSourceAdapter, RawFile, RawMediaItem, RefreshOutcome};
pub use clients::{HttpUploadClient, JsonFeedAdapter};
pub use cooldown::CooldownPolicy;
pub use engine::{EngineSettings, OrgEngine};
pub use error::{CycleError, ItemError};
pub use guard::{CycleGuard, CycleGuards};
pub use hasher::{MediaHasher, Sha256Hasher};
pub use report::{CycleOutcome, CycleReport};
pub use statistics::StatisticsService;
pub use tracker::ProblemTracker;
pub use uploader::{UploadFailure, UploadFailureKind, UploadRequest, Uploader};
