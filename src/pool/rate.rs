use std::time::{Duration, Instant};

const SAMPLE_WINDOW: Duration = Duration::from_millis(1000);

/// Windowed dispatch-rate estimator.
///
/// Between samples only a counter moves; once a full window has elapsed the
/// rate is recomputed as `(count + 1) * 1000 / elapsed_ms`.
#[derive(Debug)]
pub(crate) struct RateMeter {
    last_sample: Instant,
    since_last: u64,
    rate: u64,
}

impl RateMeter {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            last_sample: now,
            since_last: 0,
            rate: 0,
        }
    }

    pub(crate) fn record(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_sample);
        if elapsed < SAMPLE_WINDOW {
            self.since_last = self.since_last.saturating_add(1);
            return;
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.rate = self
            .since_last
            .saturating_add(1)
            .saturating_mul(1000)
            .checked_div(elapsed_ms)
            .unwrap_or(0);
        self.since_last = 0;
        self.last_sample = now;
    }

    pub(crate) const fn rate(&self) -> u64 {
        self.rate
    }
}
