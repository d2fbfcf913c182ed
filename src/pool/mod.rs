//! Fixed-size worker pool with bounded, optionally priority-ordered
//! admission, per-item timeouts and a live dispatch-rate meter.
//!
//! Every worker owns one OS thread. A single dispatcher hands queued items to
//! idle workers, starting at a rotating slot. A worker that finishes pulls the
//! next admissible item itself before going idle. A watchdog abandons any
//! worker whose item overruns its timeout and starts a replacement thread in
//! the same slot, so the slot count never changes.
mod dispatch;
mod item;
mod priority;
mod queue;
mod rate;
mod worker;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::PoolError;
use crate::stop::{StopHandle, StopSignal, stop_channel};
use crate::sync::{join_with_timeout, lock, wait_timeout};

pub use item::{QueueOrdering, WorkHandler, WorkItem, WorkOutcome};
pub use priority::ThreadPriority;

use queue::QueueState;
use worker::{Slot, spawn_worker};

pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 100;

/// Default wait on the new-item signal before the dispatcher polls again.
const DISPATCH_POLL: Duration = Duration::from_millis(10);
/// Pause between strict-priority threshold recomputations.
const PRIORITY_CHECK_INTERVAL: Duration = Duration::from_millis(100);
/// Bound on how long `close` waits for threads to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Prefix for thread names.
    pub name: String,
    pub max_threads: usize,
    /// `None` admits without bound.
    pub pending_capacity: Option<usize>,
    /// Timeout for items that do not carry their own.
    pub default_timeout: Option<Duration>,
    pub dispatch_poll: Duration,
    pub priority_check_interval: Duration,
    pub join_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_owned(),
            max_threads: 10,
            pending_capacity: None,
            default_timeout: None,
            dispatch_poll: DISPATCH_POLL,
            priority_check_interval: PRIORITY_CHECK_INTERVAL,
            join_timeout: JOIN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn named(name: &str, max_threads: usize) -> Self {
        Self {
            name: name.to_owned(),
            max_threads,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), PoolError> {
        if !(MIN_THREADS..=MAX_THREADS).contains(&self.max_threads) {
            return Err(PoolError::InvalidThreadCount {
                value: self.max_threads,
                min: MIN_THREADS,
                max: MAX_THREADS,
            });
        }
        if self.pending_capacity == Some(0) {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Observable state of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Parked, waiting for an assignment.
    Idle,
    /// Handed an item; its timeout is running.
    Assigned,
    /// Executing the item.
    Running,
    /// The item overran its timeout; a replacement thread is starting.
    TimedOut,
}

pub(crate) struct Shared<T> {
    pub(crate) config: PoolConfig,
    pub(crate) handler: Arc<dyn WorkHandler<T>>,
    pub(crate) queue: Mutex<QueueState<T>>,
    /// Signalled whenever a worker gives up its last item.
    pub(crate) idle: Condvar,
    pub(crate) slots: Vec<Slot<T>>,
    pub(crate) cursor: AtomicUsize,
    pub(crate) open: AtomicBool,
    pub(crate) closing: AtomicBool,
    signal_tx: Sender<()>,
    pub(crate) signal_rx: Receiver<()>,
    pub(crate) stop: StopSignal,
}

impl<T: WorkItem> Shared<T> {
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub(crate) fn notify_dispatcher(&self) {
        drop(self.signal_tx.try_send(()));
    }

    pub(crate) fn deadline_for(&self, item: &T) -> Option<Instant> {
        item.timeout()
            .or(self.config.default_timeout)
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }

    /// Takes an item for an idle worker and marks that worker busy.
    pub(crate) fn take_for_dispatch(&self) -> Option<Arc<T>> {
        let mut queue = lock(&self.queue);
        if self.is_closing() {
            return None;
        }
        let item = queue.pop_admissible()?;
        queue.busy = queue.busy.saturating_add(1);
        queue.rate.record(Instant::now());
        Some(item)
    }

    /// Takes a follow-up item for a worker that just finished one. When
    /// nothing is admissible the worker stops counting as busy.
    pub(crate) fn take_follow_up(&self) -> Option<Arc<T>> {
        let mut queue = lock(&self.queue);
        let next = if self.is_closing() {
            None
        } else {
            queue.pop_admissible()
        };
        if next.is_some() {
            queue.rate.record(Instant::now());
        } else {
            queue.busy = queue.busy.saturating_sub(1);
            self.idle.notify_all();
        }
        next
    }

    pub(crate) fn release_busy(&self) {
        let mut queue = lock(&self.queue);
        queue.busy = queue.busy.saturating_sub(1);
        self.idle.notify_all();
    }
}

pub struct WorkerPool<T: WorkItem> {
    shared: Arc<Shared<T>>,
    stop: Mutex<StopHandle>,
    support: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: WorkItem> WorkerPool<T> {
    /// Builds a pool and starts dispatching immediately.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is out of range or a thread
    /// cannot be spawned.
    pub fn new<H>(config: PoolConfig, handler: H) -> Result<Self, PoolError>
    where
        H: WorkHandler<T>,
    {
        let pool = Self::build(config, Arc::new(handler))?;
        pool.open();
        Ok(pool)
    }

    /// Builds a pool holding `items` without dispatching them until
    /// [`WorkerPool::open`] is called. Items beyond the capacity are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is out of range or a thread
    /// cannot be spawned.
    pub fn with_preload<H, I>(config: PoolConfig, handler: H, items: I) -> Result<Self, PoolError>
    where
        H: WorkHandler<T>,
        I: IntoIterator<Item = T>,
    {
        let pool = Self::build(config, Arc::new(handler))?;
        let mut rejected: usize = 0;
        {
            let mut queue = lock(&pool.shared.queue);
            for item in items {
                if !queue.push(Arc::new(item)) {
                    rejected = rejected.saturating_add(1);
                }
            }
        }
        if rejected > 0 {
            tracing::warn!(
                "Pool '{}' preload dropped {} items over capacity",
                pool.shared.config.name,
                rejected
            );
        }
        Ok(pool)
    }

    fn build(config: PoolConfig, handler: Arc<dyn WorkHandler<T>>) -> Result<Self, PoolError> {
        config.validate()?;
        let (signal_tx, signal_rx) = bounded::<()>(1);
        let (stop_handle, stop_signal) = stop_channel();
        let slots = (0..config.max_threads).map(Slot::new).collect();
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::new(config.pending_capacity)),
            config,
            handler,
            idle: Condvar::new(),
            slots,
            cursor: AtomicUsize::new(0),
            open: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            signal_tx,
            signal_rx,
            stop: stop_signal,
        });
        let pool = Self {
            shared,
            stop: Mutex::new(stop_handle),
            support: Mutex::new(Vec::new()),
        };

        for slot in &pool.shared.slots {
            let handle = spawn_worker(&pool.shared, slot.index, 0)?;
            lock(&slot.state).thread = Some(handle);
        }
        pool.spawn_support("dispatch", dispatch::run_dispatcher)?;
        pool.spawn_support("watchdog", worker::run_watchdog)?;
        if T::ORDERING == QueueOrdering::StrictPriority {
            pool.spawn_support("threshold", dispatch::run_threshold_sampler)?;
        }
        tracing::debug!(
            "Pool '{}' started with {} workers",
            pool.shared.config.name,
            pool.shared.config.max_threads
        );
        Ok(pool)
    }

    fn spawn_support(&self, role: &str, body: fn(&Arc<Shared<T>>)) -> Result<(), PoolError> {
        let name = format!("{}-{}", self.shared.config.name, role);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(&shared))
            .map_err(|source| PoolError::ThreadSpawn { name, source })?;
        lock(&self.support).push(handle);
        Ok(())
    }

    /// Starts dispatching. Calling it again has no effect.
    pub fn open(&self) {
        if !self.shared.open.swap(true, Ordering::AcqRel) {
            self.shared.notify_dispatcher();
        }
    }

    /// Admits `item` unless the queue is at capacity or the pool is closed.
    pub fn enqueue(&self, item: T) -> bool {
        self.enqueue_arc(Arc::new(item))
    }

    pub fn enqueue_arc(&self, item: Arc<T>) -> bool {
        if self.shared.is_closing() {
            return false;
        }
        let admitted = lock(&self.shared.queue).push(item);
        if admitted {
            self.shared.notify_dispatcher();
        }
        admitted
    }

    /// Replaces any pending item with the same identity, then admits `item`.
    pub fn enqueue_replace(&self, item: T) -> bool {
        if self.shared.is_closing() {
            return false;
        }
        let admitted = {
            let mut queue = lock(&self.shared.queue);
            while queue.remove(&item) {}
            queue.push(Arc::new(item))
        };
        if admitted {
            self.shared.notify_dispatcher();
        }
        admitted
    }

    pub fn remove(&self, item: &T) -> bool {
        lock(&self.shared.queue).remove(item)
    }

    /// Drops every pending item and returns how many there were.
    pub fn purge(&self) -> usize {
        let purged = lock(&self.shared.queue).purge();
        self.shared.idle.notify_all();
        purged
    }

    #[must_use]
    pub fn peek(&self) -> Option<Arc<T>> {
        lock(&self.shared.queue).peek()
    }

    /// Free queue slots; `usize::MAX` when unbounded.
    #[must_use]
    pub fn available_capacity(&self) -> usize {
        lock(&self.shared.queue).available()
    }

    #[must_use]
    pub fn total_capacity(&self) -> Option<usize> {
        lock(&self.shared.queue).capacity()
    }

    #[must_use]
    pub fn pending_work_items(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    #[must_use]
    pub fn pending_items(&self) -> Vec<Arc<T>> {
        lock(&self.shared.queue).snapshot()
    }

    #[must_use]
    pub fn peak_usage(&self) -> usize {
        lock(&self.shared.queue).peak()
    }

    /// Items dispatched per second over the last full sample window.
    #[must_use]
    pub fn current_dispatch_rate(&self) -> u64 {
        lock(&self.shared.queue).rate.rate()
    }

    /// Highest priority value currently admissible in strict mode.
    #[must_use]
    pub fn current_threshold(&self) -> i64 {
        lock(&self.shared.queue).threshold()
    }

    #[must_use]
    pub fn worker_states(&self) -> Vec<WorkerPhase> {
        self.shared
            .slots
            .iter()
            .map(|slot| lock(&slot.state).phase)
            .collect()
    }

    /// Workers holding an item.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.count_phase(|phase| matches!(phase, WorkerPhase::Assigned | WorkerPhase::Running))
    }

    /// Workers parked waiting for work.
    #[must_use]
    pub fn blocked_threads(&self) -> usize {
        self.count_phase(|phase| phase == WorkerPhase::Idle)
    }

    #[must_use]
    pub fn total_threads(&self) -> usize {
        self.shared.slots.len()
    }

    fn count_phase(&self, wanted: impl Fn(WorkerPhase) -> bool) -> usize {
        self.worker_states()
            .into_iter()
            .filter(|phase| wanted(*phase))
            .count()
    }

    /// Waits until nothing is pending and no worker holds an item.
    /// Returns `false` on timeout.
    #[must_use]
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return false;
        };
        let mut queue = lock(&self.shared.queue);
        loop {
            if queue.is_empty() && queue.busy == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline || self.shared.is_closing() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(now);
            queue = wait_timeout(&self.shared.idle, queue, remaining.min(self.shared.config.dispatch_poll));
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closing()
    }

    /// Purges pending work, stops every thread and waits up to the join
    /// timeout for them. Threads still running afterwards are abandoned.
    pub fn close(&self) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        let purged = lock(&self.shared.queue).purge();
        lock(&self.stop).trigger();
        for slot in &self.shared.slots {
            let _state = lock(&slot.state);
            slot.wake.notify_all();
        }
        self.shared.idle.notify_all();

        let mut handles: Vec<JoinHandle<()>> = lock(&self.support).drain(..).collect();
        for slot in &self.shared.slots {
            if let Some(handle) = lock(&slot.state).thread.take() {
                handles.push(handle);
            }
        }
        let abandoned = join_with_timeout(handles, self.shared.config.join_timeout);
        if abandoned > 0 {
            tracing::warn!(
                "Pool '{}' abandoned {} threads that did not stop in time",
                self.shared.config.name,
                abandoned
            );
        }
        tracing::debug!(
            "Pool '{}' closed, {} pending items purged",
            self.shared.config.name,
            purged
        );
    }
}

impl<T: WorkItem> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}
