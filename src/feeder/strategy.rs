use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::pool::WorkerPool;
use crate::protocol::MetricsReport;
use crate::request::LoadTest;
use crate::settings::LiveSettings;
use crate::stop::StopSignal;

use super::RunReporter;
use super::item::{LoadItem, UserPhase, think_time};

/// Feeder pause when the pool has no room.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);
/// Granularity of the drain wait between metrics ticks.
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fed {
    Completed,
    Stopped,
}

/// Samples the test's metrics at most once per interval, plus once at the
/// end of the run.
pub(crate) struct Meter {
    test: Arc<dyn LoadTest>,
    reporter: Arc<dyn RunReporter>,
    interval: Duration,
    last: Instant,
}

impl Meter {
    pub(crate) fn new(
        test: Arc<dyn LoadTest>,
        reporter: Arc<dyn RunReporter>,
        interval: Duration,
    ) -> Self {
        Self {
            test,
            reporter,
            interval,
            last: Instant::now(),
        }
    }

    pub(crate) fn tick(&mut self, finished: bool) {
        let now = Instant::now();
        if !finished && now.saturating_duration_since(self.last) < self.interval {
            return;
        }
        self.last = now;
        let Some(metrics) = self.test.metrics() else {
            return;
        };
        let summary = metrics
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        info!(class = self.test.name(), finished, "Meter: {}", summary);
        self.reporter
            .metrics(&MetricsReport::new(self.test.name(), finished, metrics));
    }
}

/// Everything an admission strategy touches.
pub(crate) struct Feed<'run> {
    pub(crate) test: &'run dyn LoadTest,
    pub(crate) pool: &'run WorkerPool<LoadItem>,
    pub(crate) settings: &'run mut LiveSettings,
    pub(crate) stop: &'run StopSignal,
    pub(crate) meter: &'run mut Meter,
    pub(crate) settle: Duration,
}

/// Users a linear ramp calls for `elapsed` into a `ramp_up` window.
pub(crate) fn users_required(elapsed: Duration, ramp_up: Duration, users: u64) -> u64 {
    if ramp_up.is_zero() || elapsed >= ramp_up {
        return users;
    }
    let engaged = u128::from(users)
        .saturating_mul(elapsed.as_millis())
        .checked_div(ramp_up.as_millis())
        .unwrap_or_else(|| u128::from(users));
    u64::try_from(engaged).unwrap_or(users).min(users)
}

impl Feed<'_> {
    /// Issues `total_requests` items, re-reading the total so an update
    /// changes how many remain.
    pub(crate) fn by_message(&mut self) -> Fed {
        let mut issued: u64 = 0;
        loop {
            if self.stop.is_stopped() {
                return Fed::Stopped;
            }
            let current = self.settings.current();
            if issued >= current.total_requests {
                break;
            }
            if self.pool.available_capacity() > 0 {
                let item = LoadItem::new(self.test.new_request(current), Instant::now(), Duration::ZERO);
                item.mark_in_progress();
                if self.pool.enqueue(item) {
                    issued = issued.saturating_add(1);
                }
            } else if self.stop.sleep(IDLE_BACKOFF) {
                return Fed::Stopped;
            }
            self.meter.tick(false);
        }
        self.drain_and_settle()
    }

    /// Ramps up simulated users and cycles them until the duration elapses.
    pub(crate) fn by_user(&mut self) -> Fed {
        let initial = self.settings.current().clone();
        let ramp_up = Duration::from_secs(initial.ramp_up_secs);
        let duration = Duration::from_secs(initial.duration_secs);
        let started = Instant::now();
        let mut population: Vec<Arc<LoadItem>> = Vec::new();
        while started.elapsed() < duration {
            if self.stop.is_stopped() {
                return Fed::Stopped;
            }
            let now = Instant::now();
            let required = users_required(now.saturating_duration_since(started), ramp_up, initial.users);
            while u64::try_from(population.len()).unwrap_or(u64::MAX) < required {
                let request = self.test.new_request(self.settings.current());
                population.push(Arc::new(LoadItem::new(
                    request,
                    now,
                    think_time(initial.rate_min_secs, initial.rate_max_secs),
                )));
            }
            for user in &population {
                if self.pool.available_capacity() == 0 {
                    break;
                }
                if user.claim_if_due(now) {
                    if !self.pool.enqueue_arc(Arc::clone(user)) {
                        user.mark_done();
                    }
                } else if user.phase() == UserPhase::Done {
                    let _reset = user.reset_if_done(
                        now,
                        think_time(initial.rate_min_secs, initial.rate_max_secs),
                    );
                }
            }
            if self.stop.sleep(IDLE_BACKOFF) {
                return Fed::Stopped;
            }
            self.meter.tick(false);
        }
        self.drain_and_settle()
    }

    fn drain_and_settle(&mut self) -> Fed {
        while !self.pool.wait_idle(DRAIN_POLL) {
            if self.stop.is_stopped() || self.pool.is_closed() {
                return Fed::Stopped;
            }
            self.meter.tick(false);
        }
        if self.stop.sleep(self.settle) {
            return Fed::Stopped;
        }
        self.meter.tick(true);
        Fed::Completed
    }
}
