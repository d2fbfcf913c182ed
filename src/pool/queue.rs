use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use super::item::{QueueOrdering, WorkItem};
use super::rate::RateMeter;

/// Sort key for items without a priority.
pub(crate) const UNPRIORITIZED: i64 = i64::MAX;

fn rank<T: WorkItem>(item: &T) -> i64 {
    item.priority().unwrap_or(UNPRIORITIZED)
}

/// Scheduler state guarded by the pool's single queue lock.
pub(crate) struct QueueState<T> {
    items: VecDeque<Arc<T>>,
    capacity: Option<usize>,
    peak: usize,
    threshold: i64,
    /// Workers currently holding an item.
    pub(crate) busy: usize,
    pub(crate) rate: RateMeter,
}

impl<T: WorkItem> QueueState<T> {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            peak: 0,
            threshold: UNPRIORITIZED,
            busy: 0,
            rate: RateMeter::new(Instant::now()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub(crate) fn available(&self) -> usize {
        self.capacity
            .map_or(usize::MAX, |cap| cap.saturating_sub(self.items.len()))
    }

    pub(crate) const fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) const fn threshold(&self) -> i64 {
        self.threshold
    }

    pub(crate) const fn set_threshold(&mut self, threshold: i64) {
        self.threshold = threshold;
    }

    /// Admits `item` unless the queue is full.
    pub(crate) fn push(&mut self, item: Arc<T>) -> bool {
        if self.capacity.is_some_and(|cap| self.items.len() >= cap) {
            return false;
        }
        match T::ORDERING {
            QueueOrdering::Fifo => self.items.push_back(item),
            QueueOrdering::Priority | QueueOrdering::StrictPriority => {
                let key = rank(item.as_ref());
                if key < self.threshold {
                    self.threshold = key;
                }
                match self.items.iter().position(|queued| rank(queued.as_ref()) > key) {
                    Some(index) => self.items.insert(index, item),
                    None => self.items.push_back(item),
                }
            }
        }
        if self.items.len() > self.peak {
            self.peak = self.items.len();
        }
        true
    }

    pub(crate) fn remove(&mut self, item: &T) -> bool {
        let found = self
            .items
            .iter()
            .position(|queued| std::ptr::eq(queued.as_ref(), item) || queued.same_item(item));
        found.and_then(|index| self.items.remove(index)).is_some()
    }

    pub(crate) fn purge(&mut self) -> usize {
        let purged = self.items.len();
        self.items.clear();
        purged
    }

    pub(crate) fn peek(&self) -> Option<Arc<T>> {
        self.items.front().cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.iter().cloned().collect()
    }

    /// Lowest pending priority, or [`UNPRIORITIZED`] when empty.
    pub(crate) fn lowest_pending(&self) -> i64 {
        self.items
            .front()
            .map_or(UNPRIORITIZED, |head| rank(head.as_ref()))
    }

    /// Takes the next dispatchable item, honouring the strict threshold.
    pub(crate) fn pop_admissible(&mut self) -> Option<Arc<T>> {
        if T::ORDERING == QueueOrdering::StrictPriority {
            let head = self.items.front()?;
            if rank(head.as_ref()) > self.threshold {
                return None;
            }
        }
        self.items.pop_front()
    }
}
