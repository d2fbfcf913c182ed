use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::RecvTimeoutError;

use crate::sync::{lock, wait_timeout};

use super::item::WorkItem;
use super::{Shared, WorkerPhase};

pub(crate) fn run_dispatcher<T: WorkItem>(shared: &Arc<Shared<T>>) {
    loop {
        if shared.is_closing() {
            return;
        }
        match shared.signal_rx.recv_timeout(shared.config.dispatch_poll) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        if shared.open.load(Ordering::Acquire) {
            dispatch_round(shared);
        }
    }
}

/// Assigns at most one item to each idle slot, starting at the cursor.
fn dispatch_round<T: WorkItem>(shared: &Shared<T>) {
    let slots = shared.slots.len();
    let start = shared.cursor.load(Ordering::Relaxed);
    for offset in 0..slots {
        let index = start.saturating_add(offset).checked_rem(slots).unwrap_or(0);
        let Some(slot) = shared.slots.get(index) else {
            continue;
        };
        let mut state = lock(&slot.state);
        if state.phase != WorkerPhase::Idle {
            continue;
        }
        let Some(item) = shared.take_for_dispatch() else {
            break;
        };
        state.deadline = shared.deadline_for(&item);
        state.item = Some(item);
        state.phase = WorkerPhase::Assigned;
        slot.wake.notify_one();
    }
    let next = start.saturating_add(1).checked_rem(slots).unwrap_or(0);
    shared.cursor.store(next, Ordering::Relaxed);
}

/// Strict-priority sampler: whenever every worker is idle, reset the
/// admission threshold to the lowest pending priority.
pub(crate) fn run_threshold_sampler<T: WorkItem>(shared: &Arc<Shared<T>>) {
    loop {
        let lowest = {
            let mut queue = lock(&shared.queue);
            while queue.busy > 0 && !shared.is_closing() {
                queue = wait_timeout(&shared.idle, queue, shared.config.priority_check_interval);
            }
            if shared.is_closing() {
                return;
            }
            queue.lowest_pending()
        };
        // A hint may only hold the threshold down, never admit past the lowest level.
        let threshold = shared.handler.threshold_hint(lowest).min(lowest);
        {
            let mut queue = lock(&shared.queue);
            // Skip if work arrived or started while the hint ran.
            if queue.busy == 0 && queue.lowest_pending() == lowest {
                queue.set_threshold(threshold);
            }
        }
        shared.notify_dispatcher();
        if shared.stop.sleep(shared.config.priority_check_interval) {
            return;
        }
    }
}
