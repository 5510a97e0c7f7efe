//! # Event History
//!
//! Bounded ring buffer of recently emitted events.
//!
//! - Holds at most `capacity` records
//! - Appending beyond capacity evicts the oldest record
//! - Reads return owned copies, never the live buffer

use std::collections::VecDeque;
use std::sync::Arc;

use crate::events::EventRecord;
use crate::DEFAULT_HISTORY_CAPACITY;

/// Bounded log of emitted events, oldest first.
#[derive(Debug, Clone)]
pub struct EventHistory {
    /// Records in emission order.
    records: VecDeque<Arc<EventRecord>>,

    /// Maximum number of records retained.
    capacity: usize,
}

impl EventHistory {
    /// Create an empty history with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append a record, returning the evicted one if the buffer was full.
    pub fn push(&mut self, record: Arc<EventRecord>) -> Option<Arc<EventRecord>> {
        if self.capacity == 0 {
            return Some(record);
        }

        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Owned copy of the buffer, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records.iter().map(|record| (**record).clone()).collect()
    }

    /// Most recently appended record.
    #[must_use]
    pub fn latest(&self) -> Option<&EventRecord> {
        self.records.back().map(AsRef::as_ref)
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
