//! Harvest Core Library
//!
//! This crate provides the domain models, the upload eligibility rules, error
//! types and configuration shared by every Harvest component.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod models;
pub mod source_error;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use eligibility::{
    is_forbidden_media, is_forbidden_upload, UploadPolicy, MANUAL_OVERRIDABLE_REASONS,
    UNRESOLVABLE_MARKER,
};
pub use error::{HarvestError, HarvestResult, LogLevel};
pub use source_error::{SourceError, SourceResultExt};
