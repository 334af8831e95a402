//! The simulated kernel - deferred work, queues, and execution slots
//!
//! Three flavours of deferred execution share one scheduler core:
//! - Softirqs: six fixed kinds, strict FIFO, run on CPU slots
//! - Tasklets: driver-raised, high/normal split, run on CPU slots
//! - Workqueues: priority-sorted, may sleep once, run on worker slots
//!
//! Nothing here touches real hardware. Slots are capacity, time is
//! whatever the tick driver says it is.

pub mod completed;
pub mod completion;
pub mod config;
pub mod driver;
pub mod error;
pub mod factory;
pub mod policy;
pub mod scheduler;
pub mod stats;
pub mod visualizer;
pub mod work;


pub use completed::CompletedBuffer;
pub use completion::CompletionRule;
pub use config::SimConfig;
pub use driver::{Clock, ManualClock, TickDriver};
pub use error::{SimError, SimResult};
pub use factory::{WorkFactory, WorkOverrides};
pub use policy::{FifoQueue, HighFirstQueue, PrioritySortedQueue, QueuePolicy};
pub use scheduler::Scheduler;
pub use stats::Statistics;
pub use visualizer::Snapshot;
pub use work::{Category, Priority, SleepState, WorkId, WorkItem, WorkState};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Upper bound on slots for any variant
pub const MAX_CONCURRENCY: usize = 64;

/// Which deferred-execution mechanism a simulator models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Softirq vectors on CPU slots
    #[default]
    Softirq,
    /// Tasklets on CPU slots
    Tasklet,
    /// Work items on worker-thread slots
    Workqueue,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Softirq, Variant::Tasklet, Variant::Workqueue];

    /// Stable identifier used by the host UI
    pub fn id(self) -> &'static str {
        match self {
            Variant::Softirq => "softirq",
            Variant::Tasklet => "tasklet",
            Variant::Workqueue => "workqueue",
        }
    }

    /// Label for an execution slot
    pub fn slot_label(self) -> &'static str {
        match self {
            Variant::Softirq | Variant::Tasklet => "CPU",
            Variant::Workqueue => "Worker",
        }
    }

    /// Milliseconds per planned-duration unit
    pub fn duration_unit_ms(self) -> f64 {
        match self {
            Variant::Softirq | Variant::Tasklet => 100.0,
            Variant::Workqueue => 1000.0,
        }
    }

    /// Range the factory draws planned durations from (in units)
    pub fn duration_range(self) -> RangeInclusive<u32> {
        match self {
            Variant::Softirq => 1..=5,
            Variant::Tasklet => 1..=3,
            Variant::Workqueue => 3..=12,
        }
    }

    /// Default per-tick chance of a spontaneously raised item
    pub fn default_spawn_probability(self) -> f64 {
        match self {
            Variant::Softirq | Variant::Tasklet => 0.10,
            Variant::Workqueue => 0.05,
        }
    }

    /// Only worker pools can be resized at runtime
    pub fn is_resizable(self) -> bool {
        self == Variant::Workqueue
    }

    /// How items reach completion under this variant
    pub fn completion_rule(self) -> CompletionRule {
        match self {
            Variant::Softirq | Variant::Tasklet => CompletionRule::Elapsed {
                unit_ms: self.duration_unit_ms(),
            },
            Variant::Workqueue => CompletionRule::Progress {
                unit_ms: self.duration_unit_ms(),
                sleep_unit_ms: 1000.0,
            },
        }
    }

    /// The pending-queue ordering this variant uses
    pub fn queue_policy(self) -> Box<dyn QueuePolicy> {
        match self {
            Variant::Softirq => Box::new(FifoQueue::new()),
            Variant::Tasklet => Box::new(HighFirstQueue::new()),
            Variant::Workqueue => Box::new(PrioritySortedQueue::new()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Variant {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimError::UnknownVariant(s.to_string()))
    }
}
