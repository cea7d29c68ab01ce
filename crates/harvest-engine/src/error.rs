use harvest_core::models::MediaId;
use harvest_core::{HarvestError, LogLevel, SourceError};

/// Organization-wide failure that aborts a cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("No media source adapter configured for organization {0}")]
    AdapterMissing(String),

    #[error("Fatal source error for organization {org_id}: {source}")]
    Source {
        org_id: String,
        #[source]
        source: SourceError,
    },

    #[error("Media {0} not found")]
    MediaNotFound(MediaId),

    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

impl CycleError {
    pub fn org_source(org_id: impl Into<String>, source: SourceError) -> Self {
        CycleError::Source {
            org_id: org_id.into(),
            source,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            CycleError::Source { .. } => LogLevel::Error,
            CycleError::AdapterMissing(_) => LogLevel::Warn,
            CycleError::MediaNotFound(_) => LogLevel::Debug,
            CycleError::Harvest(e) => e.log_level(),
        }
    }
}

/// Failure while processing one media item.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// Skip the item; it is retried on the next cycle.
    #[error("Transient failure: {0}")]
    Transient(SourceError),

    /// Abort the cycle.
    #[error("Fatal failure: {0}")]
    Fatal(SourceError),

    #[error(transparent)]
    Store(#[from] HarvestError),
}

impl From<SourceError> for ItemError {
    fn from(err: SourceError) -> Self {
        if err.is_fatal() {
            ItemError::Fatal(err)
        } else {
            ItemError::Transient(err)
        }
    }
}
