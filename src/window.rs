use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::ClassificationEvent;

/// Bounded, insertion-ordered window over the most recent classifications.
/// Appending past the bound evicts the oldest entry; order is always
/// arrival order.
pub struct ResultWindow {
    events: VecDeque<ClassificationEvent>,
    capacity: usize,
}

impl ResultWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ResultWindow {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, event: ClassificationEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Owned copy of the current contents, oldest first. The pipeline hands
    /// these out and keeps appending; nobody reads the live deque.
    pub fn snapshot(&self) -> Vec<ClassificationEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// When the visible table is refreshed: after every n-th classified record,
/// with the final unconditional refresh handled by the session loop at
/// stream end.
#[derive(Debug, Clone, Copy)]
pub struct PublishPolicy {
    every: u64,
}

impl PublishPolicy {
    pub fn every(n: usize) -> Self {
        PublishPolicy {
            every: n.max(1) as u64,
        }
    }

    pub fn should_publish(&self, records_classified: u64) -> bool {
        records_classified % self.every == 0
    }
}

/// Latest published table, shareable with a renderer thread. Publishing
/// replaces the contents wholesale under the lock, so readers never see a
/// torn table and never hold up the classification loop for longer than one
/// swap.
#[derive(Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<Mutex<Vec<ClassificationEvent>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Vec<ClassificationEvent>) {
        *self.inner.lock() = snapshot;
    }

    pub fn latest(&self) -> Vec<ClassificationEvent> {
        self.inner.lock().clone()
    }
}
