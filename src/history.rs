//! Bounded rolling history
//!
//! A fixed-capacity FIFO used for every rolling record list in the crate.
//! Eviction policy: when a push makes the length exceed the capacity, records
//! are dropped from the front (oldest first) until the length equals the
//! capacity again.

use std::collections::VecDeque;

/// Fixed-capacity FIFO queue of records
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Create an empty history holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Build a history from existing records, keeping only the newest `capacity`
    pub fn from_vec(items: Vec<T>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        for item in items {
            history.push(item);
        }
        history
    }

    /// Append a record, evicting the oldest ones beyond capacity.
    ///
    /// Returns the number of evicted records.
    pub fn push(&mut self, item: T) -> usize {
        self.items.push_back(item);
        let mut evicted = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// The newest `n` records, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Clone the newest `n` records into a vector, oldest first
    pub fn tail_vec(&self, n: usize) -> Vec<T> {
        self.tail(n).cloned().collect()
    }
}
