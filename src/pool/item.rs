use std::time::Duration;

use super::ThreadPriority;

/// How pending items are ordered and admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrdering {
    /// Plain arrival order.
    Fifo,
    /// Sorted ascending by priority; ties keep arrival order.
    Priority,
    /// As `Priority`, and only items at or below the current threshold are
    /// dispatched.
    StrictPriority,
}

/// A unit of work the pool can schedule.
///
/// Only [`WorkItem::ORDERING`] is required to differ from the defaults for a
/// type to opt into priority scheduling.
pub trait WorkItem: Send + Sync + 'static {
    const ORDERING: QueueOrdering = QueueOrdering::Fifo;

    /// Lower is more urgent. Items without a priority sort last.
    fn priority(&self) -> Option<i64> {
        None
    }

    /// Per-item execution limit, overriding the pool default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Scheduling hint applied to the worker thread for this item only.
    fn thread_priority(&self) -> Option<ThreadPriority> {
        None
    }

    /// Logical identity used by `remove` and `enqueue_replace`, in addition
    /// to pointer identity.
    fn same_item(&self, _other: &Self) -> bool {
        false
    }
}

/// Result of one item's execution, as reported to the completion hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    Failed { message: String },
    TimedOut,
}

impl WorkOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, WorkOutcome::Completed)
    }
}

/// The callbacks a pool drives for every item.
pub trait WorkHandler<T>: Send + Sync + 'static {
    /// Runs on the worker thread before `run`.
    fn started(&self, _item: &T) {}

    /// Executes the item. An `Err` or a panic is reported as
    /// [`WorkOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns a message describing why the item failed.
    fn run(&self, item: &T) -> Result<(), String>;

    /// Runs on the worker thread after `run`, or on the watchdog thread when
    /// the item timed out. Called exactly once per dispatched item.
    fn completed(&self, _item: &T, _outcome: &WorkOutcome) {}

    /// Adjusts the strict-priority threshold chosen from the queue. The pool
    /// clamps the result to `lowest_pending`, so a hint can only lower it.
    fn threshold_hint(&self, lowest_pending: i64) -> i64 {
        lowest_pending
    }
}

impl<T, F> WorkHandler<T> for F
where
    F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
{
    fn run(&self, item: &T) -> Result<(), String> {
        self(item)
    }
}
