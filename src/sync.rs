//! Lock helpers shared by the pool and the transport.
//!
//! User callbacks run on pool threads and may panic; a poisoned lock only
//! means a panic happened elsewhere, so the data is still used.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'guard, T>(
    condvar: &Condvar,
    guard: MutexGuard<'guard, T>,
) -> MutexGuard<'guard, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait_timeout<'guard, T>(
    condvar: &Condvar,
    guard: MutexGuard<'guard, T>,
    timeout: Duration,
) -> MutexGuard<'guard, T> {
    match condvar.wait_timeout(guard, timeout) {
        Ok((guard, _)) => guard,
        Err(poisoned) => poisoned.into_inner().0,
    }
}

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Joins `handles`, giving up on any thread still running after `timeout`.
/// Threads left behind are detached. Returns how many were detached.
pub(crate) fn join_with_timeout(
    handles: Vec<std::thread::JoinHandle<()>>,
    timeout: Duration,
) -> usize {
    let deadline = std::time::Instant::now().checked_add(timeout);
    let mut pending = handles;
    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(std::thread::JoinHandle::is_finished);
        for handle in finished {
            if handle.join().is_err() {
                tracing::warn!("Background thread exited with a panic");
            }
        }
        pending = running;
        if pending.is_empty() || deadline.is_none_or(|limit| std::time::Instant::now() >= limit) {
            break;
        }
        std::thread::sleep(JOIN_POLL);
    }
    pending.len()
}
