use std::time::Instant;

use super::names;

/// Nanosecond ticks in one millisecond.
pub const TICKS_PER_MS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy)]
pub(super) struct Mark {
    at: Instant,
    iterations: u64,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Window {
    pub(super) started: Instant,
    pub(super) get: Mark,
    pub(super) set: Mark,
}

impl Window {
    pub(super) const fn starting(now: Instant) -> Self {
        let mark = Mark {
            at: now,
            iterations: 0,
        };
        Self {
            started: now,
            get: mark,
            set: mark,
        }
    }
}

/// Derived values for one operation. Averages and rates are NaN until the
/// operation has run at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationRates {
    pub iterations: u64,
    pub ticks: u64,
    /// Mean latency in milliseconds.
    pub average_ms: f64,
    /// Throughput since the previous sample.
    pub per_second: f64,
    /// Throughput since the run started.
    pub average_per_second: f64,
}

impl OperationRates {
    #[expect(
        clippy::float_arithmetic,
        reason = "Derived rates are reported as floating point"
    )]
    pub(super) fn derive(
        iterations: u64,
        ticks: u64,
        mark: &mut Mark,
        started: Instant,
        now: Instant,
    ) -> Self {
        if iterations == 0 {
            *mark = Mark { at: now, iterations };
            return Self {
                iterations,
                ticks,
                average_ms: f64::NAN,
                per_second: f64::NAN,
                average_per_second: f64::NAN,
            };
        }
        let window_secs = now.saturating_duration_since(mark.at).as_secs_f64();
        let delta = iterations.saturating_sub(mark.iterations);
        let per_second = if window_secs > 0.0 {
            delta as f64 / window_secs
        } else {
            f64::NAN
        };
        let lifetime_secs = now.saturating_duration_since(started).as_secs_f64();
        let average_per_second = if lifetime_secs > 0.0 {
            iterations as f64 / lifetime_secs
        } else {
            f64::NAN
        };
        *mark = Mark { at: now, iterations };
        Self {
            iterations,
            ticks,
            average_ms: ticks as f64 / TICKS_PER_MS / iterations as f64,
            per_second,
            average_per_second,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub get: OperationRates,
    pub set: OperationRates,
}

impl MetricsSnapshot {
    /// Named values in broadcast order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        [
            (names::GET_ITERATIONS, self.get.iterations as f64),
            (names::SET_ITERATIONS, self.set.iterations as f64),
            (names::GET_TICKS, self.get.ticks as f64),
            (names::SET_TICKS, self.set.ticks as f64),
            (names::AVERAGE_GET_TIME, self.get.average_ms),
            (names::AVERAGE_SET_TIME, self.set.average_ms),
            (names::GETS_PER_SECOND, self.get.per_second),
            (names::SETS_PER_SECOND, self.set.per_second),
            (names::AVERAGE_GETS_PER_SECOND, self.get.average_per_second),
            (names::AVERAGE_SETS_PER_SECOND, self.set.average_per_second),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
    }
}
