//! Cooperative stop signal for background threads.
//!
//! A [`StopHandle`] owns the sending half of a channel that never carries a
//! message; dropping or triggering it disconnects every [`StopSignal`], which
//! wakes any thread sleeping in [`StopSignal::sleep`] immediately.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

pub struct StopHandle {
    sender: Option<Sender<()>>,
    flag: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct StopSignal {
    receiver: Receiver<()>,
    flag: Arc<AtomicBool>,
}

#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (sender, receiver) = bounded::<()>(1);
    let flag = Arc::new(AtomicBool::new(false));
    (
        StopHandle {
            sender: Some(sender),
            flag: Arc::clone(&flag),
        },
        StopSignal { receiver, flag },
    )
}

impl StopHandle {
    pub fn trigger(&mut self) {
        self.flag.store(true, Ordering::Release);
        drop(self.sender.take());
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.trigger();
    }
}

impl StopSignal {
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` or until stopped. Returns `true` when stopped.
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.receiver.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
        }
    }
}
