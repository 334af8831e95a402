//! Bounded history of completed work, most recent first

use super::work::WorkItem;
use std::collections::VecDeque;

/// Default number of completions kept
pub const COMPLETED_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct CompletedBuffer {
    items: VecDeque<WorkItem>,
    capacity: usize,
    /// Items dropped off the tail since the last clear
    evicted: u64,
}

impl CompletedBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Insert at the front, evicting the oldest past capacity
    pub fn push(&mut self, item: WorkItem) -> Option<WorkItem> {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.evicted += 1;
            self.items.pop_back()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
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

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.evicted = 0;
    }
}

impl Default for CompletedBuffer {
    fn default() -> Self {
        Self::new(COMPLETED_CAPACITY)
    }
}
