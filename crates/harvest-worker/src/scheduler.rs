//! Cycle scheduler: bounded pool, periodic trigger loop and on-demand triggers.
//!
//! A trigger takes the organization's guard immediately, then waits for a pool
//! slot in its own task. Triggers for an organization whose guard is held,
//! whether its cycle is running or still queued, are dropped.
//!
//! Shutdown: [`CycleScheduler::shutdown`] stops the periodic loop; it does not
//! wait for in-flight cycles. Use [`CycleScheduler::drain`] to give them a
//! bounded time to finish before process exit.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use harvest_core::{HarvestConfig, LogLevel};
use harvest_engine::CycleGuard;

use crate::monitor::{CycleEvent, CycleMonitor};
use crate::runner::CycleRunner;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_workers: usize,
    /// Period of the trigger loop. The first tick fires immediately.
    pub cycle_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            cycle_interval: Duration::from_secs(3600),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            max_workers: config.scheduler_max_workers,
            cycle_interval: Duration::from_secs(config.cycle_interval_secs),
        }
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// The cycle task was spawned; it may still be waiting for a pool slot.
    Scheduled(JoinHandle<()>),
    /// A cycle for the organization is already running or queued.
    AlreadyRunning,
}

impl TriggerOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, TriggerOutcome::Scheduled(_))
    }

    /// Wait for the scheduled cycle to finish. No-op when the trigger was dropped.
    pub async fn join(self) {
        if let TriggerOutcome::Scheduled(handle) = self {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Cycle task panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct CycleScheduler {
    runner: Arc<dyn CycleRunner>,
    monitor: Arc<dyn CycleMonitor>,
    semaphore: Arc<Semaphore>,
    config: SchedulerConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl CycleScheduler {
    /// Create the scheduler and spawn its periodic loop. Must be called from
    /// within a tokio runtime.
    pub fn new(
        runner: Arc<dyn CycleRunner>,
        monitor: Arc<dyn CycleMonitor>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = Self::build(runner, monitor, config, shutdown_tx);

        let looping = scheduler.clone();
        tokio::spawn(async move {
            looping.trigger_loop(shutdown_rx).await;
        });

        scheduler
    }

    /// Create a scheduler without the periodic loop, for on-demand triggers only.
    pub fn new_without_loop(
        runner: Arc<dyn CycleRunner>,
        monitor: Arc<dyn CycleMonitor>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self::build(runner, monitor, config, shutdown_tx)
    }

    fn build(
        runner: Arc<dyn CycleRunner>,
        monitor: Arc<dyn CycleMonitor>,
        config: SchedulerConfig,
        shutdown_tx: mpsc::Sender<()>,
    ) -> Self {
        let max_workers = config.max_workers.max(1);
        Self {
            runner,
            monitor,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            config: SchedulerConfig {
                max_workers,
                ..config
            },
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Pool slots not taken by a running cycle.
    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Schedule a cycle for one organization unless one is already in flight.
    #[tracing::instrument(skip(self))]
    pub fn trigger(&self, org_id: &str, is_manual: bool) -> TriggerOutcome {
        let Some(guard) = self.runner.try_begin(org_id) else {
            tracing::debug!("Cycle already in flight, trigger dropped");
            return TriggerOutcome::AlreadyRunning;
        };

        let runner = self.runner.clone();
        let monitor = self.monitor.clone();
        let semaphore = self.semaphore.clone();
        let handle = tokio::spawn(async move {
            Self::run_guarded(runner, monitor, semaphore, guard, is_manual).await;
        });
        TriggerOutcome::Scheduled(handle)
    }

    /// Trigger a scheduled cycle for every registered organization.
    pub async fn trigger_all(&self) -> Vec<(String, TriggerOutcome)> {
        let org_ids = self.runner.organization_ids().await;
        tracing::debug!(organizations = org_ids.len(), "Triggering all organizations");
        org_ids
            .into_iter()
            .map(|org_id| {
                let outcome = self.trigger(&org_id, false);
                (org_id, outcome)
            })
            .collect()
    }

    async fn run_guarded(
        runner: Arc<dyn CycleRunner>,
        monitor: Arc<dyn CycleMonitor>,
        semaphore: Arc<Semaphore>,
        guard: CycleGuard,
        is_manual: bool,
    ) {
        let org_id = guard.org_id().to_string();
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(org_id = %org_id, "Worker pool closed, cycle dropped");
                return;
            }
        };

        tracing::debug!(org_id = %org_id, is_manual, "Cycle started");
        // Own task so a panicking cycle surfaces as a JoinError; the guard
        // unwinds with it.
        let cycle = tokio::spawn(async move { runner.run(guard, is_manual).await });
        let event = match cycle.await {
            Ok(Ok(report)) => CycleEvent::Completed(report),
            Err(e) => {
                tracing::error!(org_id = %org_id, error = %e, "Cycle task panicked");
                CycleEvent::Failed {
                    org_id,
                    error: format!("Cycle panicked: {}", e),
                }
            }
            Ok(Err(e)) => {
                match e.log_level() {
                    LogLevel::Debug => tracing::debug!(org_id = %org_id, error = %e, "Cycle aborted"),
                    LogLevel::Warn => tracing::warn!(org_id = %org_id, error = %e, "Cycle aborted"),
                    LogLevel::Error => tracing::error!(org_id = %org_id, error = %e, "Cycle aborted"),
                }
                CycleEvent::Failed {
                    org_id,
                    error: e.to_string(),
                }
            }
        };
        monitor.record(event).await;
    }

    async fn trigger_loop(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            max_workers = self.config.max_workers,
            cycle_interval_secs = self.config.cycle_interval.as_secs(),
            "Cycle scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.cycle_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cycle scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let outcomes = self.trigger_all().await;
                    let dropped = outcomes
                        .iter()
                        .filter(|(_, outcome)| !outcome.is_scheduled())
                        .count();
                    if dropped > 0 {
                        tracing::info!(dropped, "Organizations still busy, triggers dropped");
                    }
                }
            }
        }

        tracing::info!("Cycle scheduler stopped");
    }

    /// Signals the periodic loop to stop. Returns immediately; cycles already
    /// spawned keep running.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating cycle scheduler shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Wait until every pool slot is free, at most `timeout`. Returns whether
    /// the pool drained in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let slots = self.config.max_workers as u32;
        match tokio::time::timeout(timeout, self.semaphore.acquire_many(slots)).await {
            Ok(Ok(_permits)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "In-flight cycles still running at shutdown"
                );
                false
            }
        }
    }
}
