//! Completion rules
//!
//! How an occupied slot advances on each tick:
//! - Elapsed: done once `now - started_at` reaches the planned length.
//!   Nothing is accumulated; a late tick completes immediately.
//! - Progress: `elapsed / planned` is accumulated per tick. Items that
//!   may sleep pause once past the halfway mark, hold their slot for the
//!   sleep length, then resume.

use super::work::{WorkItem, WorkState};

/// Fraction past which a sleep-capable item goes to sleep
pub const SLEEP_THRESHOLD: f64 = 0.5;

/// Completion strategy, selected per variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionRule {
    /// Wall-clock threshold (softirq, tasklet)
    Elapsed { unit_ms: f64 },
    /// Accumulated fraction with one optional sleep (workqueue)
    Progress { unit_ms: f64, sleep_unit_ms: f64 },
}

/// What happened to one occupied slot during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still running
    Running,
    /// Still sleeping
    Asleep,
    /// Went to sleep this tick
    Slept,
    /// Woke up this tick
    Woke,
    /// Reached its threshold; the caller completes it
    Finished,
}

impl CompletionRule {
    /// Whether items carry an explicit progress fraction
    pub fn tracks_progress(&self) -> bool {
        matches!(self, CompletionRule::Progress { .. })
    }

    /// Advance one Active or Sleeping item
    pub fn step(&self, item: &mut WorkItem, now: f64, elapsed: f64) -> Step {
        match *self {
            CompletionRule::Elapsed { unit_ms } => {
                let started = item.started_at().unwrap_or(now);
                if now - started >= f64::from(item.planned_duration()) * unit_ms {
                    Step::Finished
                } else {
                    Step::Running
                }
            }
            CompletionRule::Progress {
                unit_ms,
                sleep_unit_ms,
            } => {
                if item.state() == WorkState::Sleeping {
                    let Some(sleep) = item.sleep().copied() else {
                        item.wake();
                        return Step::Woke;
                    };
                    let since = now - sleep.sleep_started_at.unwrap_or(now);
                    if since >= f64::from(sleep.sleep_duration) * sleep_unit_ms {
                        item.wake();
                        return Step::Woke;
                    }
                    return Step::Asleep;
                }

                if item.can_sleep() && !item.has_slept() && item.progress() > SLEEP_THRESHOLD {
                    item.begin_sleep(now);
                    return Step::Slept;
                }

                item.advance(elapsed / (f64::from(item.planned_duration()) * unit_ms));
                if item.progress() >= 1.0 {
                    Step::Finished
                } else {
                    Step::Running
                }
            }
        }
    }
}
