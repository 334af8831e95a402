//! Work item abstraction
//!
//! A WorkItem is the unit of deferred execution: a raised softirq, a
//! scheduled tasklet, or a queued work item. Identity, category, priority
//! and planned duration are fixed at creation; everything else moves
//! through the state machine below and only the scheduler drives it.
//!
//! ```text
//! Pending ──dispatch──► Active ──complete──► Completed
//!                       │    ▲
//!                  sleep│    │wake   (workqueue only, at most once)
//!                       ▼    │
//!                      Sleeping
//! ```

use super::Variant;
use super::error::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WorkId(pub u64);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Softirq vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SoftirqKind {
    Hi,
    Timer,
    NetTx,
    NetRx,
    Block,
    Tasklet,
}

/// Drivers that schedule tasklets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskletSource {
    Net,
    Usb,
    Block,
    Input,
    Timer,
}

/// Named workqueues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkqueueKind {
    System,
    Kblockd,
    Kswapd,
    Events,
    Usb,
}

/// The labelled kind of a work item. Each variant has its own closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Softirq(SoftirqKind),
    Tasklet(TaskletSource),
    Workqueue(WorkqueueKind),
}

const SOFTIRQ_CATEGORIES: [Category; 6] = [
    Category::Softirq(SoftirqKind::Hi),
    Category::Softirq(SoftirqKind::Timer),
    Category::Softirq(SoftirqKind::NetTx),
    Category::Softirq(SoftirqKind::NetRx),
    Category::Softirq(SoftirqKind::Block),
    Category::Softirq(SoftirqKind::Tasklet),
];

const TASKLET_CATEGORIES: [Category; 5] = [
    Category::Tasklet(TaskletSource::Net),
    Category::Tasklet(TaskletSource::Usb),
    Category::Tasklet(TaskletSource::Block),
    Category::Tasklet(TaskletSource::Input),
    Category::Tasklet(TaskletSource::Timer),
];

const WORKQUEUE_CATEGORIES: [Category; 5] = [
    Category::Workqueue(WorkqueueKind::System),
    Category::Workqueue(WorkqueueKind::Kblockd),
    Category::Workqueue(WorkqueueKind::Kswapd),
    Category::Workqueue(WorkqueueKind::Events),
    Category::Workqueue(WorkqueueKind::Usb),
];

impl Category {
    /// Every category a variant can produce, in display order
    pub fn all(variant: Variant) -> &'static [Category] {
        match variant {
            Variant::Softirq => &SOFTIRQ_CATEGORIES,
            Variant::Tasklet => &TASKLET_CATEGORIES,
            Variant::Workqueue => &WORKQUEUE_CATEGORIES,
        }
    }

    /// Look up a category by its short id within a variant's set
    pub fn parse(variant: Variant, id: &str) -> Result<Category, SimError> {
        let id = id.trim();
        Category::all(variant)
            .iter()
            .copied()
            .find(|c| c.id().eq_ignore_ascii_case(id))
            .ok_or_else(|| SimError::UnknownCategory(id.to_string()))
    }

    pub fn variant(self) -> Variant {
        match self {
            Category::Softirq(_) => Variant::Softirq,
            Category::Tasklet(_) => Variant::Tasklet,
            Category::Workqueue(_) => Variant::Workqueue,
        }
    }

    /// Short id, as shown on pending-queue badges
    pub fn id(self) -> &'static str {
        match self {
            Category::Softirq(k) => match k {
                SoftirqKind::Hi => "HI",
                SoftirqKind::Timer => "TIMER",
                SoftirqKind::NetTx => "NET_TX",
                SoftirqKind::NetRx => "NET_RX",
                SoftirqKind::Block => "BLOCK",
                SoftirqKind::Tasklet => "TASKLET",
            },
            Category::Tasklet(s) => match s {
                TaskletSource::Net => "net",
                TaskletSource::Usb => "usb",
                TaskletSource::Block => "block",
                TaskletSource::Input => "input",
                TaskletSource::Timer => "timer",
            },
            Category::Workqueue(w) => match w {
                WorkqueueKind::System => "system",
                WorkqueueKind::Kblockd => "kblockd",
                WorkqueueKind::Kswapd => "kswapd",
                WorkqueueKind::Events => "events",
                WorkqueueKind::Usb => "usb",
            },
        }
    }

    /// Full name
    pub fn name(self) -> &'static str {
        match self {
            Category::Softirq(k) => match k {
                SoftirqKind::Hi => "HI_SOFTIRQ",
                SoftirqKind::Timer => "TIMER_SOFTIRQ",
                SoftirqKind::NetTx => "NET_TX_SOFTIRQ",
                SoftirqKind::NetRx => "NET_RX_SOFTIRQ",
                SoftirqKind::Block => "BLOCK_SOFTIRQ",
                SoftirqKind::Tasklet => "TASKLET_SOFTIRQ",
            },
            Category::Tasklet(s) => match s {
                TaskletSource::Net => "Network Driver",
                TaskletSource::Usb => "USB Driver",
                TaskletSource::Block => "Block Driver",
                TaskletSource::Input => "Input Driver",
                TaskletSource::Timer => "Timer",
            },
            Category::Workqueue(w) => match w {
                WorkqueueKind::System => "System Workqueue",
                WorkqueueKind::Kblockd => "kblockd",
                WorkqueueKind::Kswapd => "kswapd",
                WorkqueueKind::Events => "events",
                WorkqueueKind::Usb => "usb",
            },
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Softirq(k) => match k {
                SoftirqKind::Hi => "High priority tasks",
                SoftirqKind::Timer => "Timer processing",
                SoftirqKind::NetTx => "Network transmission",
                SoftirqKind::NetRx => "Network reception",
                SoftirqKind::Block => "Block device I/O",
                SoftirqKind::Tasklet => "Tasklet processing",
            },
            Category::Tasklet(s) => match s {
                TaskletSource::Net => "Network packet processing",
                TaskletSource::Usb => "USB device events",
                TaskletSource::Block => "Disk I/O completion",
                TaskletSource::Input => "Input device events",
                TaskletSource::Timer => "Timer expiration",
            },
            Category::Workqueue(w) => match w {
                WorkqueueKind::System => "Default shared workqueue",
                WorkqueueKind::Kblockd => "Block device operations",
                WorkqueueKind::Kswapd => "Memory management",
                WorkqueueKind::Events => "System events",
                WorkqueueKind::Usb => "USB subsystem",
            },
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Priority & State
// ============================================================================

/// Priority class. Lower rank dispatches first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn id(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High Priority",
            Priority::Normal => "Normal Priority",
            Priority::Low => "Low Priority",
        }
    }
}

impl FromStr for Priority {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimError::UnknownPriority(s.to_string()))
    }
}

/// Work item lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkState {
    /// Waiting in the pending queue
    Pending,
    /// Occupying a slot and making progress
    Active,
    /// Occupying a slot, paused mid-execution
    Sleeping,
    /// Finished, held in the completed buffer
    Completed,
}

/// One-shot sleep behaviour of a work item that is allowed to block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepState {
    /// How long the item sleeps, in seconds
    pub sleep_duration: u32,
    /// Set on entering Sleeping; never cleared while the item lives
    pub has_slept_once: bool,
    /// When the current sleep began
    pub sleep_started_at: Option<f64>,
}

impl SleepState {
    pub fn new(sleep_duration: u32) -> Self {
        Self {
            sleep_duration,
            has_slept_once: false,
            sleep_started_at: None,
        }
    }
}

// ============================================================================
// WorkItem
// ============================================================================

/// A unit of deferred work
#[derive(Debug, Clone)]
pub struct WorkItem {
    id: WorkId,
    category: Category,
    priority: Priority,
    /// When the item entered the pending queue (simulated ms)
    created_at: f64,
    /// Planned length in variant units
    planned_duration: u32,
    state: WorkState,
    /// Occupied slot, only while Active or Sleeping
    slot: Option<usize>,
    /// Last slot the item ran on, kept after completion
    ran_on: Option<usize>,
    started_at: Option<f64>,
    completed_at: Option<f64>,
    /// Fraction of the planned duration done (progress rule only)
    progress: f64,
    /// Present only for items that may sleep
    sleep: Option<SleepState>,
}

impl WorkItem {
    /// Create a pending item
    pub fn new(
        id: WorkId,
        category: Category,
        priority: Priority,
        created_at: f64,
        planned_duration: u32,
        sleep: Option<SleepState>,
    ) -> Self {
        Self {
            id,
            category,
            priority,
            created_at,
            planned_duration,
            state: WorkState::Pending,
            slot: None,
            ran_on: None,
            started_at: None,
            completed_at: None,
            progress: 0.0,
            sleep,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn planned_duration(&self) -> u32 {
        self.planned_duration
    }

    /// Planned length in simulated milliseconds
    pub fn planned_ms(&self) -> f64 {
        f64::from(self.planned_duration) * self.category.variant().duration_unit_ms()
    }

    pub fn state(&self) -> WorkState {
        self.state
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn ran_on(&self) -> Option<usize> {
        self.ran_on
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<f64> {
        self.completed_at
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn sleep(&self) -> Option<&SleepState> {
        self.sleep.as_ref()
    }

    pub fn can_sleep(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn has_slept(&self) -> bool {
        self.sleep.is_some_and(|s| s.has_slept_once)
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == WorkState::Sleeping
    }

    /// Creation-to-completion time, once completed
    pub fn latency(&self) -> Option<f64> {
        self.completed_at.map(|done| done - self.created_at)
    }

    /// Fraction shown on a slot's bar.
    ///
    /// Elapsed-rule items have no stored progress, so it is derived from
    /// the start time.
    pub fn display_progress(&self, now: f64) -> f64 {
        match self.state {
            WorkState::Pending => 0.0,
            WorkState::Completed => 1.0,
            WorkState::Active | WorkState::Sleeping => {
                if self.category.variant().completion_rule().tracks_progress() {
                    self.progress.clamp(0.0, 1.0)
                } else {
                    let started = self.started_at.unwrap_or(now);
                    ((now - started) / self.planned_ms()).clamp(0.0, 1.0)
                }
            }
        }
    }

    // ---- transitions, driven by the scheduler ----

    /// Pending → Active on `slot`
    pub(crate) fn dispatch(&mut self, slot: usize, now: f64) {
        debug_assert_eq!(self.state, WorkState::Pending);
        self.state = WorkState::Active;
        self.slot = Some(slot);
        self.ran_on = Some(slot);
        self.started_at = Some(now);
        self.progress = 0.0;
    }

    /// Active → Completed. Frees the slot.
    pub(crate) fn complete(&mut self, now: f64) {
        debug_assert_eq!(self.state, WorkState::Active);
        self.state = WorkState::Completed;
        self.slot = None;
        self.completed_at = Some(now);
        self.progress = 1.0;
    }

    /// Active → Sleeping. Marks the single allowed sleep as used.
    pub(crate) fn begin_sleep(&mut self, now: f64) {
        debug_assert_eq!(self.state, WorkState::Active);
        if let Some(sleep) = self.sleep.as_mut() {
            sleep.has_slept_once = true;
            sleep.sleep_started_at = Some(now);
            self.state = WorkState::Sleeping;
        }
    }

    /// Sleeping → Active
    pub(crate) fn wake(&mut self) {
        debug_assert_eq!(self.state, WorkState::Sleeping);
        if let Some(sleep) = self.sleep.as_mut() {
            sleep.sleep_started_at = None;
        }
        self.state = WorkState::Active;
    }

    pub(crate) fn advance(&mut self, fraction: f64) {
        self.progress += fraction;
    }

    /// Active/Sleeping → Pending, as if it had never been dispatched
    pub(crate) fn requeue(&mut self) {
        self.state = WorkState::Pending;
        self.slot = None;
        self.ran_on = None;
        self.started_at = None;
        self.progress = 0.0;
        if let Some(sleep) = self.sleep.as_mut() {
            *sleep = SleepState::new(sleep.sleep_duration);
        }
    }
}
