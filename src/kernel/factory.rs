//! Work Item Factory
//!
//! Produces randomly parameterized work items for one variant. All
//! randomness comes from the generator passed in, so a seeded generator
//! yields the same items every run.

use super::Variant;
use super::error::{SimError, SimResult};
use super::work::{Category, Priority, SleepState, WorkId, WorkItem};
use rand::Rng;
use std::ops::RangeInclusive;

/// Chance a tasklet is raised as high priority when none is requested
pub const TASKLET_HIGH_PROBABILITY: f64 = 0.3;

/// Chance a work item is allowed to sleep once
pub const WORK_SLEEP_PROBABILITY: f64 = 0.3;

/// Sleep length range for work items, in seconds
pub const WORK_SLEEP_RANGE: RangeInclusive<u32> = 1..=3;

/// Fields a caller may pin instead of drawing at random
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkOverrides {
    pub category: Option<Category>,
    /// Ignored by softirqs, which have no priority
    pub priority: Option<Priority>,
    /// Planned duration in variant units
    pub duration: Option<u32>,
    /// Workqueue only
    pub can_sleep: Option<bool>,
    /// Workqueue only, seconds
    pub sleep_duration: Option<u32>,
}

impl WorkOverrides {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_sleep(mut self, sleep_duration: u32) -> Self {
        self.can_sleep = Some(true);
        self.sleep_duration = Some(sleep_duration);
        self
    }

    pub fn without_sleep(mut self) -> Self {
        self.can_sleep = Some(false);
        self
    }

    /// Build overrides from the string ids a host UI sends
    pub fn from_hints(
        variant: Variant,
        category: Option<&str>,
        priority: Option<&str>,
    ) -> SimResult<Self> {
        let category = category
            .filter(|s| !s.trim().is_empty())
            .map(|id| Category::parse(variant, id))
            .transpose()?;
        let priority = priority
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<Priority>)
            .transpose()?;
        Ok(Self {
            category,
            priority,
            ..Self::default()
        })
    }
}

/// Creates work items for one variant and hands out their ids
#[derive(Debug)]
pub struct WorkFactory {
    variant: Variant,
    next_id: u64,
}

impl WorkFactory {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            next_id: 1,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Create a pending item stamped with `now`.
    ///
    /// Fails only when the category override belongs to another variant.
    /// Ids keep counting across simulator resets.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: f64,
        overrides: WorkOverrides,
    ) -> SimResult<WorkItem> {
        let categories = Category::all(self.variant);
        let category = match overrides.category {
            Some(c) if c.variant() != self.variant => {
                return Err(SimError::ForeignCategory {
                    variant: self.variant,
                    category: c.id(),
                });
            }
            Some(c) => c,
            None => categories[rng.random_range(0..categories.len())],
        };

        let duration = match overrides.duration {
            Some(d) => d.max(1),
            None => rng.random_range(self.variant.duration_range()),
        };

        let priority = match self.variant {
            Variant::Softirq => Priority::Normal,
            Variant::Tasklet => match overrides.priority {
                Some(Priority::High) => Priority::High,
                Some(_) => Priority::Normal,
                None if rng.random_bool(TASKLET_HIGH_PROBABILITY) => Priority::High,
                None => Priority::Normal,
            },
            Variant::Workqueue => match overrides.priority {
                Some(p) => p,
                None => Priority::ALL[rng.random_range(0..Priority::ALL.len())],
            },
        };

        let sleep = if self.variant == Variant::Workqueue {
            let can_sleep = overrides
                .can_sleep
                .unwrap_or_else(|| rng.random_bool(WORK_SLEEP_PROBABILITY));
            let sleep_duration = overrides
                .sleep_duration
                .unwrap_or_else(|| rng.random_range(WORK_SLEEP_RANGE));
            can_sleep.then(|| SleepState::new(sleep_duration))
        } else {
            None
        };

        let id = WorkId(self.next_id);
        self.next_id += 1;

        Ok(WorkItem::new(id, category, priority, now, duration, sleep))
    }
}
