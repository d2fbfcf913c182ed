//! Test runner: feeds a [`WorkerPool`](crate::pool::WorkerPool) with
//! requests from a [`LoadTest`](crate::request::LoadTest) and reports
//! progress.
//!
//! By-message runs issue a fixed number of requests as fast as the pool
//! accepts them. By-user runs ramp up simulated users that each resubmit
//! their request after a random think time. Either way the runner drains
//! the pool, settles, and sends a final metrics sample.
mod handler;
mod item;
mod run;
mod strategy;


use std::sync::Mutex;
use std::time::Duration;

use crate::protocol::{AgentStatus, MetricsReport};
use crate::sync::lock;

pub use item::UserPhase;
pub use run::{RunOutcome, TestRun};

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(10);
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Quiet period between the last request and the final sample.
    pub settle: Duration,
    pub metrics_interval: Duration,
    /// Pending-queue bound; defaults to the worker count.
    pub pending_capacity: Option<usize>,
    /// How long `TestRun::stop` waits for the feeder thread.
    pub stop_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            pending_capacity: None,
            stop_timeout: STOP_TIMEOUT,
        }
    }
}

/// Receives a run's status changes and metrics samples.
pub trait RunReporter: Send + Sync + 'static {
    fn status(&self, status: AgentStatus);
    fn metrics(&self, report: &MetricsReport);
}

/// Keeps everything it is told, in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<AgentStatus>>,
    reports: Mutex<Vec<MetricsReport>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<AgentStatus> {
        lock(&self.statuses).clone()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<MetricsReport> {
        lock(&self.reports).clone()
    }

    #[must_use]
    pub fn last_report(&self) -> Option<MetricsReport> {
        lock(&self.reports).last().cloned()
    }
}

impl RunReporter for RecordingReporter {
    fn status(&self, status: AgentStatus) {
        lock(&self.statuses).push(status);
    }

    fn metrics(&self, report: &MetricsReport) {
        lock(&self.reports).push(report.clone());
    }
}
