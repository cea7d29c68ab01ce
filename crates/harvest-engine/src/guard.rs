//! Per-organization in-flight guard
//!
//! At most one cycle runs per organization. Acquisition never waits: a caller
//! that finds the guard held drops its trigger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct CycleGuards {
    running: Arc<Mutex<HashSet<String>>>,
}

impl CycleGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is always left consistent, so a poisoned lock is still usable.
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the guard for `org_id`, or `None` if a cycle already holds it.
    pub fn try_acquire(&self, org_id: &str) -> Option<CycleGuard> {
        if self.lock().insert(org_id.to_string()) {
            Some(CycleGuard {
                org_id: org_id.to_string(),
                guards: self.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, org_id: &str) -> bool {
        self.lock().contains(org_id)
    }

    pub fn running(&self) -> Vec<String> {
        let mut running: Vec<_> = self.lock().iter().cloned().collect();
        running.sort();
        running
    }
}

/// Held for the duration of one cycle; released on drop, including on panic.
#[must_use = "the cycle guard is released as soon as it is dropped"]
pub struct CycleGuard {
    org_id: String,
    guards: CycleGuards,
}

impl CycleGuard {
    pub fn org_id(&self) -> &str {
        &self.org_id
    }
}

impl std::fmt::Debug for CycleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleGuard")
            .field("org_id", &self.org_id)
            .finish()
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.guards.lock().remove(&self.org_id);
        tracing::trace!(org_id = %self.org_id, "Cycle guard released");
    }
}
