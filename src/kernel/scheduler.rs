//! Scheduler core
//!
//! Owns every work item of one simulation. An item lives in exactly one
//! place at a time: the pending queue, a slot, or the completed buffer.
//! Moves between them are by value, so the partition holds by
//! construction.
//!
//! Each tick runs in three phases:
//! 1. Advance every occupied slot; finished items move to the buffer
//! 2. Fill free slots, lowest index first, from the head of the queue
//! 3. Maybe raise one random item (only while running)
//!
//! All completions are settled before any dispatch, and dispatch sees
//! the slot array exactly as phase 1 left it.

use super::completed::CompletedBuffer;
use super::completion::{CompletionRule, Step};
use super::config::SimConfig;
use super::error::{SimError, SimResult};
use super::factory::{WorkFactory, WorkOverrides};
use super::policy::QueuePolicy;
use super::stats::Statistics;
use super::work::{WorkId, WorkItem};
use super::{MAX_CONCURRENCY, Variant};
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// What one tick did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub completed: Vec<WorkId>,
    /// (item, slot)
    pub dispatched: Vec<(WorkId, usize)>,
    pub slept: Vec<WorkId>,
    pub woke: Vec<WorkId>,
    /// Randomly raised this tick
    pub spawned: Option<WorkId>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.completed.is_empty()
            && self.dispatched.is_empty()
            && self.slept.is_empty()
            && self.woke.is_empty()
            && self.spawned.is_none()
    }
}

pub struct Scheduler<R: Rng = SmallRng> {
    variant: Variant,
    rule: CompletionRule,
    factory: WorkFactory,
    pending: Box<dyn QueuePolicy>,
    /// Fixed-length slot array; None is an idle slot
    slots: Vec<Option<WorkItem>>,
    completed: CompletedBuffer,
    stats: Statistics,
    running: bool,
    spawn_probability: f64,
    pending_preview: usize,
    /// Time of the latest tick (simulated ms)
    now: f64,
    ticks: u64,
    rng: R,
}

impl Scheduler<SmallRng> {
    /// Default configuration for `variant`, seeded generator
    pub fn seeded(variant: Variant, seed: u64) -> Self {
        Self::assemble(&SimConfig::for_variant(variant), SmallRng::seed_from_u64(seed))
    }

    /// Build from config. `fallback_seed` is used when the config has none.
    pub fn with_config(config: &SimConfig, fallback_seed: u64) -> SimResult<Self> {
        let seed = config.seed.unwrap_or(fallback_seed);
        Self::new(config, SmallRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Scheduler<R> {
    pub fn new(config: &SimConfig, rng: R) -> SimResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, rng))
    }

    fn assemble(config: &SimConfig, rng: R) -> Self {
        let variant = config.variant;
        Self {
            variant,
            rule: variant.completion_rule(),
            factory: WorkFactory::new(variant),
            pending: variant.queue_policy(),
            slots: (0..config.concurrency).map(|_| None).collect(),
            completed: CompletedBuffer::new(config.completed_capacity),
            stats: Statistics::new(variant),
            running: false,
            spawn_probability: config.spawn_probability(),
            pending_preview: config.pending_preview,
            now: 0.0,
            ticks: 0,
            rng,
        }
    }

    // ---- intents ----

    pub fn start(&mut self) {
        if !self.running {
            info!("{} simulation started at {:.0}ms", self.variant, self.now);
        }
        self.running = true;
    }

    pub fn pause(&mut self) {
        if self.running {
            info!("{} simulation paused at {:.0}ms", self.variant, self.now);
        }
        self.running = false;
    }

    /// Discard all work and zero the statistics. Leaves the slot count
    /// and the clock alone.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.completed.clear();
        self.stats = Statistics::new(self.variant);
        self.running = false;
        self.ticks = 0;
        info!("{} simulation reset", self.variant);
    }

    /// Enqueue one item now, bypassing the random draw
    pub fn inject(&mut self, overrides: WorkOverrides) -> SimResult<WorkId> {
        let item = self
            .factory
            .create(&mut self.rng, self.now, overrides)
            .inspect_err(|e| warn!("inject rejected: {}", e))?;
        let id = item.id();
        debug!(
            "raised {} {} ({:?}, {:.0}ms)",
            id,
            item.category(),
            item.priority(),
            item.planned_ms()
        );
        self.stats.record_injected(&item);
        self.pending.enqueue(item);
        Ok(id)
    }

    /// Resize the worker pool.
    ///
    /// Items on removed slots go back to the pending queue, reset to
    /// never-started.
    pub fn set_concurrency(&mut self, n: usize) -> SimResult<()> {
        if !self.variant.is_resizable() {
            warn!("{} rejected resize to {}", self.variant, n);
            return Err(SimError::FixedConcurrency(self.variant));
        }
        if n == 0 || n > MAX_CONCURRENCY {
            warn!("rejected concurrency {}", n);
            return Err(SimError::InvalidConcurrency(n));
        }

        let old = self.slots.len();
        if n < old {
            for mut item in self.slots.drain(n..).flatten() {
                debug!("requeued {} from removed slot", item.id());
                item.requeue();
                self.pending.enqueue(item);
            }
        } else {
            self.slots.resize_with(n, || None);
        }
        info!("{} concurrency {} -> {}", self.variant, old, n);
        Ok(())
    }

    // ---- time ----

    /// Advance the simulation to `now`, `elapsed` ms after the last tick.
    ///
    /// Time never runs backwards; a negative or non-finite `elapsed`
    /// counts as zero.
    pub fn tick(&mut self, now: f64, elapsed: f64) -> TickReport {
        let now = if now.is_finite() { now.max(self.now) } else { self.now };
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        self.now = now;
        self.ticks += 1;

        let mut report = TickReport::default();

        for index in 0..self.slots.len() {
            let Some(mut item) = self.slots[index].take() else {
                continue;
            };
            match self.rule.step(&mut item, now, elapsed) {
                Step::Finished => {
                    report.completed.push(item.id());
                    self.finish(item, now);
                }
                step => {
                    match step {
                        Step::Slept => {
                            debug!("{} sleeping on slot {}", item.id(), index);
                            report.slept.push(item.id());
                        }
                        Step::Woke => {
                            debug!("{} woke on slot {}", item.id(), index);
                            report.woke.push(item.id());
                        }
                        _ => {}
                    }
                    self.slots[index] = Some(item);
                }
            }
        }

        for index in 0..self.slots.len() {
            if self.slots[index].is_some() {
                continue;
            }
            let Some(mut item) = self.pending.dequeue_next() else {
                break;
            };
            item.dispatch(index, now);
            debug!("dispatched {} to {} {}", item.id(), self.variant.slot_label(), index);
            report.dispatched.push((item.id(), index));
            self.slots[index] = Some(item);
        }

        if self.running && self.rng.random_bool(self.spawn_probability) {
            report.spawned = self.inject(WorkOverrides::default()).ok();
        }

        report
    }

    fn finish(&mut self, mut item: WorkItem, now: f64) {
        item.complete(now);
        let latency = now - item.created_at();
        self.stats.record_completed(latency);
        debug!("completed {} after {:.0}ms", item.id(), latency);
        self.completed.push(item);
    }

    // ---- read-only state ----

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn concurrency(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<WorkItem>] {
        &self.slots
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn pending(&self) -> &VecDeque<WorkItem> {
        self.pending.peek_ordered()
    }

    pub fn policy_name(&self) -> &'static str {
        self.pending.name()
    }

    pub fn completed(&self) -> &CompletedBuffer {
        &self.completed
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn spawn_probability(&self) -> f64 {
        self.spawn_probability
    }

    pub fn pending_preview(&self) -> usize {
        self.pending_preview
    }
}
