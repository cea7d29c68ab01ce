use serde::Serialize;

use harvest_core::models::Statistics;

/// What one cycle did for one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub org_id: String,
    pub is_manual: bool,
    /// Items returned by the source page.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Media whose every file is ignored after processing.
    pub ignored: usize,
    pub uploaded: usize,
    /// Files only a manual run would upload.
    pub awaiting_manual: usize,
    /// Files held back by an upload cooldown.
    pub deferred: usize,
    /// Items skipped after a transient source failure.
    pub skipped: usize,
    pub problems_recorded: usize,
    pub statistics: Option<Statistics>,
}

impl CycleReport {
    pub fn new(org_id: impl Into<String>, is_manual: bool) -> Self {
        Self {
            org_id: org_id.into(),
            is_manual,
            ..Default::default()
        }
    }

    pub fn log(&self) {
        tracing::info!(
            org_id = %self.org_id,
            is_manual = self.is_manual,
            fetched = self.fetched,
            created = self.created,
            updated = self.updated,
            ignored = self.ignored,
            uploaded = self.uploaded,
            awaiting_manual = self.awaiting_manual,
            deferred = self.deferred,
            skipped = self.skipped,
            problems_recorded = self.problems_recorded,
            "Cycle completed"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle for the organization was in flight; nothing was done.
    AlreadyRunning,
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::AlreadyRunning => None,
            CycleOutcome::Completed(report) => Some(report),
        }
    }
}
