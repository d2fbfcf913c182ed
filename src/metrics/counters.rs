use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sync::lock;

use super::snapshot::{MetricsSnapshot, OperationRates, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Set,
}

/// Lock-free iteration and elapsed-time accumulator for one operation.
/// Ticks are nanoseconds.
#[derive(Debug, Default)]
pub struct OperationCounter {
    iterations: AtomicU64,
    ticks: AtomicU64,
}

impl OperationCounter {
    pub fn record(&self, elapsed: Duration) {
        let ticks = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.iterations.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
    }
}

/// Counters for one test run. Workers only touch the atomics; the window
/// lock is taken by whoever samples.
#[derive(Debug)]
pub struct GetSetMetrics {
    get: OperationCounter,
    set: OperationCounter,
    window: Mutex<Window>,
}

impl Default for GetSetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GetSetMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            get: OperationCounter::default(),
            set: OperationCounter::default(),
            window: Mutex::new(Window::starting(Instant::now())),
        }
    }

    #[must_use]
    pub const fn counter(&self, operation: Operation) -> &OperationCounter {
        match operation {
            Operation::Get => &self.get,
            Operation::Set => &self.set,
        }
    }

    pub fn record(&self, operation: Operation, elapsed: Duration) {
        self.counter(operation).record(elapsed);
    }

    /// Times `work` and records it on success.
    ///
    /// # Errors
    ///
    /// Returns whatever `work` returns; failed attempts are not counted.
    pub fn timed<R, E>(
        &self,
        operation: Operation,
        work: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, E> {
        let started = Instant::now();
        let result = work()?;
        self.record(operation, started.elapsed());
        Ok(result)
    }

    /// Zeroes every counter and restarts the sampling window at `now`.
    pub fn reset_at(&self, now: Instant) {
        let mut window = lock(&self.window);
        self.get.clear();
        self.set.clear();
        *window = Window::starting(now);
    }

    pub fn reset(&self) {
        self.reset_at(Instant::now());
    }

    /// Derives a sample at `now` and starts the next rate window there.
    pub fn sample_at(&self, now: Instant) -> MetricsSnapshot {
        let mut guard = lock(&self.window);
        let window = &mut *guard;
        let get = OperationRates::derive(
            self.get.iterations(),
            self.get.ticks(),
            &mut window.get,
            window.started,
            now,
        );
        let set = OperationRates::derive(
            self.set.iterations(),
            self.set.ticks(),
            &mut window.set,
            window.started,
            now,
        );
        MetricsSnapshot { get, set }
    }

    pub fn sample(&self) -> MetricsSnapshot {
        self.sample_at(Instant::now())
    }
}
