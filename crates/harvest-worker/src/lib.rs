//! Harvest Worker
//!
//! Decouples triggering a cycle from running it: a bounded pool of cycle
//! tasks, a per-organization in-flight guard taken at trigger time, a periodic
//! trigger loop and a monitoring sink for finished or failed cycles.

pub mod monitor;
pub mod runner;
pub mod scheduler;

pub use monitor::{ChannelMonitor, CycleEvent, CycleMonitor, TracingMonitor};
pub use runner::CycleRunner;
pub use scheduler::{CycleScheduler, SchedulerConfig, TriggerOutcome};
