use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::PoolError;
use crate::sync::{lock, wait};

use super::item::{WorkItem, WorkOutcome};
use super::priority::{self, ThreadPriority};
use super::{Shared, WorkerPhase};

pub(crate) struct SlotState<T> {
    pub(crate) phase: WorkerPhase,
    pub(crate) item: Option<Arc<T>>,
    pub(crate) deadline: Option<Instant>,
    /// Bumped when the slot's thread is abandoned; a thread whose generation
    /// no longer matches must exit without touching the slot.
    pub(crate) generation: u64,
    pub(crate) thread: Option<JoinHandle<()>>,
}

pub(crate) struct Slot<T> {
    pub(crate) index: usize,
    pub(crate) state: Mutex<SlotState<T>>,
    pub(crate) wake: Condvar,
}

impl<T> Slot<T> {
    pub(crate) const fn new(index: usize) -> Self {
        Self {
            index,
            state: Mutex::new(SlotState {
                phase: WorkerPhase::Idle,
                item: None,
                deadline: None,
                generation: 0,
                thread: None,
            }),
            wake: Condvar::new(),
        }
    }
}

pub(crate) fn spawn_worker<T: WorkItem>(
    shared: &Arc<Shared<T>>,
    index: usize,
    generation: u64,
) -> Result<JoinHandle<()>, PoolError> {
    let name = format!("{}-worker-{}", shared.config.name, index);
    let worker_shared = Arc::clone(shared);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_worker(&worker_shared, index, generation))
        .map_err(|source| PoolError::ThreadSpawn { name, source })
}

fn run_worker<T: WorkItem>(shared: &Shared<T>, index: usize, generation: u64) {
    let Some(slot) = shared.slots.get(index) else {
        return;
    };
    while let Some(item) = park(shared, slot, generation) {
        let outcome = execute(shared, &item);

        {
            let mut state = lock(&slot.state);
            if state.generation != generation {
                // The watchdog already reported this item and replaced us.
                return;
            }
            state.deadline = None;
        }
        report(shared, &item, &outcome);
        drop(item);

        let follow_up = shared.take_follow_up();
        let mut state = lock(&slot.state);
        if state.generation != generation {
            return;
        }
        match follow_up {
            Some(next) => {
                state.deadline = shared.deadline_for(&next);
                state.item = Some(next);
                state.phase = WorkerPhase::Assigned;
            }
            None => {
                state.item = None;
                state.phase = WorkerPhase::Idle;
            }
        }
    }
}

/// Blocks until this slot is assigned an item, the pool closes, or the
/// thread has been superseded.
fn park<T: WorkItem>(shared: &Shared<T>, slot: &Slot<T>, generation: u64) -> Option<Arc<T>> {
    let mut state = lock(&slot.state);
    loop {
        if state.generation != generation || shared.is_closing() {
            return None;
        }
        if state.phase == WorkerPhase::Assigned
            && let Some(item) = state.item.clone()
        {
            state.phase = WorkerPhase::Running;
            return Some(item);
        }
        state = wait(&slot.wake, state);
    }
}

fn execute<T: WorkItem>(shared: &Shared<T>, item: &Arc<T>) -> WorkOutcome {
    let hint = item.thread_priority();
    if let Some(level) = hint {
        priority::apply_current(level);
    }
    let handler = &shared.handler;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.started(item);
        handler.run(item)
    }));
    if hint.is_some() {
        priority::apply_current(ThreadPriority::Normal);
    }
    match result {
        Ok(Ok(())) => WorkOutcome::Completed,
        Ok(Err(message)) => WorkOutcome::Failed { message },
        Err(payload) => WorkOutcome::Failed {
            message: panic_message(payload.as_ref()),
        },
    }
}

fn report<T: WorkItem>(shared: &Shared<T>, item: &T, outcome: &WorkOutcome) {
    let handler = &shared.handler;
    if panic::catch_unwind(AssertUnwindSafe(|| handler.completed(item, outcome))).is_err() {
        tracing::warn!("Pool '{}' completion hook panicked", shared.config.name);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "work item panicked".to_owned()
}

/// Polls every slot's deadline and recycles overrunning workers.
pub(crate) fn run_watchdog<T: WorkItem>(shared: &Arc<Shared<T>>) {
    while !shared.stop.sleep(shared.config.dispatch_poll) {
        let now = Instant::now();
        for slot in &shared.slots {
            recycle_if_expired(shared, slot, now);
        }
    }
}

fn recycle_if_expired<T: WorkItem>(shared: &Arc<Shared<T>>, slot: &Slot<T>, now: Instant) {
    let (item, generation) = {
        let mut state = lock(&slot.state);
        let holding = matches!(state.phase, WorkerPhase::Assigned | WorkerPhase::Running);
        if !holding || !state.deadline.is_some_and(|deadline| deadline <= now) {
            return;
        }
        state.generation = state.generation.wrapping_add(1);
        state.phase = WorkerPhase::TimedOut;
        state.deadline = None;
        // Detach the stuck thread; it exits on its own if its work returns.
        drop(state.thread.take());
        (state.item.take(), state.generation)
    };
    slot.wake.notify_all();
    tracing::warn!(
        "Pool '{}' worker {} timed out; replacing its thread",
        shared.config.name,
        slot.index
    );

    if let Some(item) = item {
        report(shared, &item, &WorkOutcome::TimedOut);
    }
    shared.release_busy();

    match spawn_worker(shared, slot.index, generation) {
        Ok(handle) => {
            let mut state = lock(&slot.state);
            if state.generation == generation {
                state.thread = Some(handle);
                state.phase = WorkerPhase::Idle;
            }
        }
        Err(err) => {
            tracing::warn!(
                "Pool '{}' could not replace worker {}: {}",
                shared.config.name,
                slot.index,
                err
            );
        }
    }
    shared.notify_dispatcher();
}
