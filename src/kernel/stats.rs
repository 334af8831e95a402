//! Simulation statistics
//!
//! Counters move only when items are injected or completed.
//! Per-category and per-priority tallies count injections.

use super::Variant;
use super::work::{Category, Priority, WorkItem};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Items that entered the pending queue
    pub total_injected: u64,
    /// Items that finished
    pub total_completed: u64,
    /// Mean creation-to-completion time (simulated ms)
    pub avg_latency_ms: f64,
    /// Injections per category; every category of the variant is present
    pub by_category: BTreeMap<Category, u64>,
    /// Injections per priority class
    pub by_priority: BTreeMap<Priority, u64>,
}

impl Statistics {
    pub fn new(variant: Variant) -> Self {
        Self {
            total_injected: 0,
            total_completed: 0,
            avg_latency_ms: 0.0,
            by_category: Category::all(variant).iter().map(|&c| (c, 0)).collect(),
            by_priority: BTreeMap::new(),
        }
    }

    pub fn record_injected(&mut self, item: &WorkItem) {
        self.total_injected += 1;
        *self.by_category.entry(item.category()).or_insert(0) += 1;
        *self.by_priority.entry(item.priority()).or_insert(0) += 1;
    }

    /// Fold one completion into the running mean
    pub fn record_completed(&mut self, latency_ms: f64) {
        self.total_completed += 1;
        let n = self.total_completed as f64;
        self.avg_latency_ms = (self.avg_latency_ms * (n - 1.0) + latency_ms) / n;
    }

    pub fn category_count(&self, category: Category) -> u64 {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn priority_count(&self, priority: Priority) -> u64 {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }

    /// Percentage of injections in `category`
    pub fn share(&self, category: Category) -> f64 {
        if self.total_injected == 0 {
            0.0
        } else {
            self.category_count(category) as f64 * 100.0 / self.total_injected as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::work::{TaskletSource, WorkId};

    #[test]
    fn test_running_mean() {
        let mut stats = Statistics::new(Variant::Softirq);
        for latency in [100.0, 200.0, 600.0] {
            stats.record_completed(latency);
        }
        assert_eq!(stats.total_completed, 3);
        assert!((stats.avg_latency_ms - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_categories_start_at_zero() {
        let stats = Statistics::new(Variant::Tasklet);
        assert_eq!(stats.by_category.len(), 5);
        assert!(stats.by_category.values().all(|&n| n == 0));
        assert_eq!(stats.share(Category::Tasklet(TaskletSource::Usb)), 0.0);
    }

    #[test]
    fn test_injection_tallies() {
        let mut stats = Statistics::new(Variant::Tasklet);
        let usb = Category::Tasklet(TaskletSource::Usb);
        let net = Category::Tasklet(TaskletSource::Net);
        stats.record_injected(&WorkItem::new(WorkId(1), usb, Priority::High, 0.0, 1, None));
        stats.record_injected(&WorkItem::new(WorkId(2), usb, Priority::Normal, 0.0, 1, None));
        stats.record_injected(&WorkItem::new(WorkId(3), net, Priority::Normal, 0.0, 1, None));
        stats.record_injected(&WorkItem::new(WorkId(4), net, Priority::Normal, 0.0, 1, None));

        assert_eq!(stats.total_injected, 4);
        assert_eq!(stats.category_count(usb), 2);
        assert_eq!(stats.priority_count(Priority::High), 1);
        assert_eq!(stats.priority_count(Priority::Normal), 3);
        assert_eq!(stats.share(usb), 50.0);
    }
}
