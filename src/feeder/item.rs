use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::{Rng, thread_rng};

use crate::pool::WorkItem;
use crate::request::Request;
use crate::sync::lock;

/// Where a simulated user is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPhase {
    /// Thinking; due once its think time has elapsed.
    Pending,
    /// Queued or running.
    InProgress,
    /// Finished its request; reset before it becomes pending again.
    Done,
}

#[derive(Debug)]
struct Cycle {
    phase: UserPhase,
    work_started: Option<Instant>,
    wait_started: Instant,
    think_time: Duration,
}

/// A request submitted to the pool. By-message runs submit each one once;
/// by-user runs resubmit the same item for every cycle of its user.
pub(crate) struct LoadItem {
    request: Box<dyn Request>,
    cycle: Mutex<Cycle>,
}

/// A think time drawn from `[min_secs, max_secs)` seconds.
pub(crate) fn think_time(min_secs: u64, max_secs: u64) -> Duration {
    let secs = if max_secs <= min_secs {
        min_secs
    } else {
        thread_rng().gen_range(min_secs..max_secs)
    };
    Duration::from_secs(secs)
}

impl LoadItem {
    pub(crate) fn new(request: Box<dyn Request>, now: Instant, think_time: Duration) -> Self {
        Self {
            request,
            cycle: Mutex::new(Cycle {
                phase: UserPhase::Pending,
                work_started: None,
                wait_started: now,
                think_time,
            }),
        }
    }

    pub(crate) fn request(&self) -> &dyn Request {
        self.request.as_ref()
    }

    pub(crate) fn phase(&self) -> UserPhase {
        lock(&self.cycle).phase
    }

    pub(crate) fn mark_in_progress(&self) {
        lock(&self.cycle).phase = UserPhase::InProgress;
    }

    /// Claims a pending user whose think time has elapsed at `now`.
    pub(crate) fn claim_if_due(&self, now: Instant) -> bool {
        let mut cycle = lock(&self.cycle);
        let due = cycle.phase == UserPhase::Pending
            && now.saturating_duration_since(cycle.wait_started) > cycle.think_time;
        if due {
            cycle.phase = UserPhase::InProgress;
        }
        due
    }

    /// Starts a fresh think period for a finished user. Returns `false` if
    /// the user was not done.
    pub(crate) fn reset_if_done(&self, now: Instant, think_time: Duration) -> bool {
        let mut cycle = lock(&self.cycle);
        if cycle.phase != UserPhase::Done {
            return false;
        }
        cycle.phase = UserPhase::Pending;
        cycle.work_started = None;
        cycle.wait_started = now;
        cycle.think_time = think_time;
        true
    }

    pub(crate) fn mark_started(&self, now: Instant) {
        lock(&self.cycle).work_started = Some(now);
    }

    pub(crate) fn work_started(&self) -> Option<Instant> {
        lock(&self.cycle).work_started
    }

    pub(crate) fn mark_done(&self) {
        lock(&self.cycle).phase = UserPhase::Done;
    }
}

impl WorkItem for LoadItem {}
