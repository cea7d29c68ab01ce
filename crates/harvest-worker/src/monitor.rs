//! Monitoring sink for cycle outcomes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use harvest_engine::CycleReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    Completed(CycleReport),
    /// The cycle aborted. The organization is triggered again on the next tick.
    Failed { org_id: String, error: String },
}

impl CycleEvent {
    pub fn org_id(&self) -> &str {
        match self {
            CycleEvent::Completed(report) => &report.org_id,
            CycleEvent::Failed { org_id, .. } => org_id,
        }
    }
}

#[async_trait]
pub trait CycleMonitor: Send + Sync {
    async fn record(&self, event: CycleEvent);
}

/// Logs every event. Reports are already logged by the engine, so only
/// failures are logged above debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

#[async_trait]
impl CycleMonitor for TracingMonitor {
    async fn record(&self, event: CycleEvent) {
        match event {
            CycleEvent::Completed(report) => {
                tracing::debug!(
                    org_id = %report.org_id,
                    uploaded = report.uploaded,
                    problems_recorded = report.problems_recorded,
                    "Cycle finished"
                );
            }
            CycleEvent::Failed { org_id, error } => {
                tracing::error!(org_id = %org_id, error = %error, "Cycle failed");
            }
        }
    }
}

/// Forwards events to a channel, e.g. for a status endpoint or tests.
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelMonitor {
    tx: mpsc::Sender<CycleEvent>,
}

impl ChannelMonitor {
    pub fn new(tx: mpsc::Sender<CycleEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<CycleEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl CycleMonitor for ChannelMonitor {
    async fn record(&self, event: CycleEvent) {
        let _ = self.tx.send(event).await;
    }
}
