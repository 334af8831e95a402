//! Simulation Visualization
//!
//! Read-only views of a scheduler for the display layer:
//! - Slot occupancy with progress
//! - Pending queue preview with overflow count
//! - Recent completions
//! - Statistics with category distribution
//!
//! Snapshots serialize to JSON for a browser host, or render as ASCII
//! for the terminal.

use super::Variant;
use super::error::SimResult;
use super::scheduler::Scheduler;
use super::work::{Priority, WorkItem, WorkState};
use rand::Rng;
use serde::Serialize;

// ============================================================================
// Item & Slot Views
// ============================================================================

/// One work item as the display layer sees it
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: u64,
    /// Short category id
    pub category: &'static str,
    pub category_name: &'static str,
    pub priority: Priority,
    pub state: WorkState,
    /// Planned length in variant units
    pub duration: u32,
    pub duration_ms: f64,
    pub slot: Option<usize>,
    /// Slot it last ran on; survives completion
    pub ran_on: Option<usize>,
    /// 0.0 - 1.0, as drawn on the slot bar
    pub progress: f64,
    pub can_sleep: bool,
    pub has_slept: bool,
    pub created_at: f64,
    pub started_at: Option<f64>,
    pub completed_at: Option<f64>,
    pub latency_ms: Option<f64>,
}

impl ItemView {
    pub fn of(item: &WorkItem, now: f64) -> Self {
        Self {
            id: item.id().0,
            category: item.category().id(),
            category_name: item.category().name(),
            priority: item.priority(),
            state: item.state(),
            duration: item.planned_duration(),
            duration_ms: item.planned_ms(),
            slot: item.slot(),
            ran_on: item.ran_on(),
            progress: item.display_progress(now),
            can_sleep: item.can_sleep(),
            has_slept: item.has_slept(),
            created_at: item.created_at(),
            started_at: item.started_at(),
            completed_at: item.completed_at(),
            latency_ms: item.latency(),
        }
    }
}

/// One CPU or worker
#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub index: usize,
    /// "CPU 0", "Worker 3"
    pub label: String,
    pub item: Option<ItemView>,
}

// ============================================================================
// Statistics View
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub id: &'static str,
    pub name: &'static str,
    pub count: u64,
    /// Percent of all injected items
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub total_injected: u64,
    pub total_completed: u64,
    pub avg_latency_ms: f64,
    pub pending: usize,
    pub by_category: Vec<CategoryCount>,
    pub by_priority: Vec<PriorityCount>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything the display layer needs for one frame
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub variant: Variant,
    pub policy: &'static str,
    pub running: bool,
    /// Simulated time of the latest tick
    pub now: f64,
    pub ticks: u64,
    pub concurrency: usize,
    pub slots: Vec<SlotView>,
    /// Head of the pending queue, in dispatch order
    pub pending: Vec<ItemView>,
    pub pending_total: usize,
    /// Pending items beyond the preview
    pub pending_overflow: usize,
    /// Most recent first
    pub completed: Vec<ItemView>,
    pub stats: StatsView,
}

impl Snapshot {
    pub fn capture<R: Rng>(scheduler: &Scheduler<R>) -> Self {
        let now = scheduler.now();
        let variant = scheduler.variant();
        let stats = scheduler.stats();
        let pending = scheduler.pending();
        let preview = scheduler.pending_preview();

        let slots = scheduler
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| SlotView {
                index,
                label: format!("{} {}", variant.slot_label(), index),
                item: slot.as_ref().map(|item| ItemView::of(item, now)),
            })
            .collect();

        let by_category = stats
            .by_category
            .iter()
            .map(|(&category, &count)| CategoryCount {
                id: category.id(),
                name: category.name(),
                count,
                share: stats.share(category),
            })
            .collect();

        let by_priority = stats
            .by_priority
            .iter()
            .map(|(&priority, &count)| PriorityCount { priority, count })
            .collect();

        Self {
            variant,
            policy: scheduler.policy_name(),
            running: scheduler.is_running(),
            now,
            ticks: scheduler.ticks(),
            concurrency: scheduler.concurrency(),
            slots,
            pending: pending
                .iter()
                .take(preview)
                .map(|item| ItemView::of(item, now))
                .collect(),
            pending_total: pending.len(),
            pending_overflow: pending.len().saturating_sub(preview),
            completed: scheduler
                .completed()
                .iter()
                .map(|item| ItemView::of(item, now))
                .collect(),
            stats: StatsView {
                total_injected: stats.total_injected,
                total_completed: stats.total_completed,
                avg_latency_ms: stats.avg_latency_ms,
                pending: pending.len(),
                by_category,
                by_priority,
            },
        }
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Occupied slot count
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.item.is_some()).count()
    }

    /// Completed items of one priority, most recent first
    pub fn completed_with_priority(&self, priority: Priority) -> impl Iterator<Item = &ItemView> {
        self.completed.iter().filter(move |i| i.priority == priority)
    }

    /// Render as ASCII panels
    pub fn render_ascii(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "=== {} ({}) ===\n",
            self.variant.id().to_uppercase(),
            if self.running { "running" } else { "paused" }
        ));
        output.push_str(&format!(
            "t={:.0}ms  |  Ticks: {}  |  Policy: {}\n\n",
            self.now, self.ticks, self.policy
        ));

        // Slots
        for slot in &self.slots {
            match &slot.item {
                Some(item) => output.push_str(&format!(
                    "  {:<9} {} {:<8} #{}{}\n",
                    slot.label,
                    render_bar(item.progress, 20),
                    truncate(item.category, 8),
                    item.id,
                    if item.state == WorkState::Sleeping { " (sleeping)" } else { "" }
                )),
                None => output.push_str(&format!("  {:<9} [{}] idle\n", slot.label, " ".repeat(20))),
            }
        }

        // Pending
        output.push_str(&format!("\nPENDING ({}):", self.pending_total));
        if self.pending.is_empty() {
            output.push_str(" (empty)");
        }
        output.push('\n');
        if !self.pending.is_empty() {
            let badges: Vec<String> = self
                .pending
                .iter()
                .map(|item| match item.priority {
                    Priority::High if self.variant != Variant::Softirq => {
                        format!("{}!", item.category)
                    }
                    _ => item.category.to_string(),
                })
                .collect();
            output.push_str(&format!("  {}", badges.join(" ")));
            if self.pending_overflow > 0 {
                output.push_str(&format!(" +{} more", self.pending_overflow));
            }
            output.push('\n');
        }

        // Completed
        output.push_str(&format!("\nCOMPLETED ({}):\n", self.completed.len()));
        for item in self.completed.iter().take(5) {
            output.push_str(&format!(
                "  ✓ {:<16} {} {}  {:.0}ms\n",
                truncate(item.category_name, 16),
                self.variant.slot_label(),
                item.ran_on.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                item.duration_ms
            ));
        }
        if self.completed.len() > 5 {
            output.push_str(&format!("  ... and {} more\n", self.completed.len() - 5));
        }

        // Stats
        output.push_str(&format!(
            "\nInjected: {}  Completed: {}  Avg latency: {:.0}ms\n",
            self.stats.total_injected, self.stats.total_completed, self.stats.avg_latency_ms
        ));
        for c in &self.stats.by_category {
            output.push_str(&format!("  {:<8} {:>4}  {:>5.1}%\n", c.id, c.count, c.share));
        }

        output
    }
}

/// `[█████░░░░░]` bar for a 0.0 - 1.0 fraction
fn render_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Truncate string with ellipsis
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
