//! Pending-queue ordering policies
//!
//! The scheduler only ever takes the head of the queue, so each policy
//! keeps its queue in dispatch order at all times. What the pending list
//! shows is exactly what will run next.

use super::work::{Priority, WorkItem};
use std::collections::VecDeque;

/// Orders pending work for dispatch
pub trait QueuePolicy {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Add a pending item
    fn enqueue(&mut self, item: WorkItem);

    /// Remove the next item to run, or None when empty
    fn dequeue_next(&mut self) -> Option<WorkItem>;

    /// Pending items in dispatch order
    fn peek_ordered(&self) -> &VecDeque<WorkItem>;

    /// Drop everything
    fn clear(&mut self);

    fn len(&self) -> usize {
        self.peek_ordered().len()
    }

    fn is_empty(&self) -> bool {
        self.peek_ordered().is_empty()
    }
}

// ============================================================================
// FIFO (softirq)
// ============================================================================

/// Strict arrival order
#[derive(Debug, Default)]
pub struct FifoQueue {
    queue: VecDeque<WorkItem>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueuePolicy for FifoQueue {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn enqueue(&mut self, item: WorkItem) {
        self.queue.push_back(item);
    }

    fn dequeue_next(&mut self) -> Option<WorkItem> {
        self.queue.pop_front()
    }

    fn peek_ordered(&self) -> &VecDeque<WorkItem> {
        &self.queue
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

// ============================================================================
// High-first split (tasklet)
// ============================================================================

/// High-priority items ahead of all normal ones, arrival order within
/// each class.
///
/// A high item is placed at enqueue time, not just preferred at dispatch:
/// it lands behind the last high item already queued.
#[derive(Debug, Default)]
pub struct HighFirstQueue {
    queue: VecDeque<WorkItem>,
    /// Length of the high-priority prefix
    high_len: usize,
}

impl HighFirstQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of high-priority items waiting
    pub fn high_len(&self) -> usize {
        self.high_len
    }
}

impl QueuePolicy for HighFirstQueue {
    fn name(&self) -> &'static str {
        "high-first"
    }

    fn enqueue(&mut self, item: WorkItem) {
        if item.priority() == Priority::High {
            self.queue.insert(self.high_len, item);
            self.high_len += 1;
        } else {
            self.queue.push_back(item);
        }
    }

    fn dequeue_next(&mut self) -> Option<WorkItem> {
        let item = self.queue.pop_front()?;
        if self.high_len > 0 {
            self.high_len -= 1;
        }
        Some(item)
    }

    fn peek_ordered(&self) -> &VecDeque<WorkItem> {
        &self.queue
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.high_len = 0;
    }
}

// ============================================================================
// Full priority sort (workqueue)
// ============================================================================

/// Re-sorted by priority rank on every insertion.
///
/// The sort is stable: equal-rank items keep their insertion order.
#[derive(Debug, Default)]
pub struct PrioritySortedQueue {
    queue: VecDeque<WorkItem>,
}

impl PrioritySortedQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueuePolicy for PrioritySortedQueue {
    fn name(&self) -> &'static str {
        "priority-sorted"
    }

    fn enqueue(&mut self, item: WorkItem) {
        self.queue.push_back(item);
        self.queue
            .make_contiguous()
            .sort_by_key(|item| item.priority().rank());
    }

    fn dequeue_next(&mut self) -> Option<WorkItem> {
        self.queue.pop_front()
    }

    fn peek_ordered(&self) -> &VecDeque<WorkItem> {
        &self.queue
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::work::{Category, SoftirqKind, TaskletSource, WorkId, WorkqueueKind};

    fn tasklet(id: u64, priority: Priority) -> WorkItem {
        WorkItem::new(
            WorkId(id),
            Category::Tasklet(TaskletSource::Net),
            priority,
            0.0,
            1,
            None,
        )
    }

    fn work(id: u64, priority: Priority) -> WorkItem {
        WorkItem::new(
            WorkId(id),
            Category::Workqueue(WorkqueueKind::Events),
            priority,
            0.0,
            3,
            None,
        )
    }

    fn ids(queue: &dyn QueuePolicy) -> Vec<u64> {
        queue.peek_ordered().iter().map(|i| i.id().0).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut q = FifoQueue::new();
        for id in 1..=3 {
            q.enqueue(WorkItem::new(
                WorkId(id),
                Category::Softirq(SoftirqKind::Hi),
                Priority::Normal,
                0.0,
                1,
                None,
            ));
        }
        assert_eq!(ids(&q), vec![1, 2, 3]);
        assert_eq!(q.dequeue_next().map(|i| i.id()), Some(WorkId(1)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_dequeue_empty_is_none() {
        assert!(FifoQueue::new().dequeue_next().is_none());
        assert!(HighFirstQueue::new().dequeue_next().is_none());
        assert!(PrioritySortedQueue::new().dequeue_next().is_none());
    }

    #[test]
    fn test_high_goes_to_front() {
        let mut q = HighFirstQueue::new();
        q.enqueue(tasklet(1, Priority::Normal));
        q.enqueue(tasklet(2, Priority::Normal));
        q.enqueue(tasklet(3, Priority::High));
        assert_eq!(ids(&q), vec![3, 1, 2]);
    }

    #[test]
    fn test_high_keeps_arrival_order_within_class() {
        let mut q = HighFirstQueue::new();
        q.enqueue(tasklet(1, Priority::Normal));
        q.enqueue(tasklet(2, Priority::High));
        q.enqueue(tasklet(3, Priority::Normal));
        q.enqueue(tasklet(4, Priority::High));
        assert_eq!(ids(&q), vec![2, 4, 1, 3]);
        assert_eq!(q.high_len(), 2);

        assert_eq!(q.dequeue_next().map(|i| i.id().0), Some(2));
        assert_eq!(q.high_len(), 1);
        q.enqueue(tasklet(5, Priority::High));
        assert_eq!(ids(&q), vec![4, 5, 1, 3]);
    }

    #[test]
    fn test_sorted_by_rank() {
        let mut q = PrioritySortedQueue::new();
        q.enqueue(work(1, Priority::Low));
        q.enqueue(work(2, Priority::Normal));
        q.enqueue(work(3, Priority::High));
        assert_eq!(ids(&q), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut q = PrioritySortedQueue::new();
        q.enqueue(work(1, Priority::Normal));
        q.enqueue(work(2, Priority::High));
        q.enqueue(work(3, Priority::Normal));
        q.enqueue(work(4, Priority::High));
        q.enqueue(work(5, Priority::Normal));
        assert_eq!(ids(&q), vec![2, 4, 1, 3, 5]);

        let order: Vec<u64> = std::iter::from_fn(|| q.dequeue_next())
            .map(|i| i.id().0)
            .collect();
        assert_eq!(order, vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_clear() {
        let mut q = HighFirstQueue::new();
        q.enqueue(tasklet(1, Priority::High));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.high_len(), 0);
    }
}
