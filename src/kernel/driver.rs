//! Tick driver
//!
//! Turns host frame timestamps into scheduler ticks:
//! - One frame is at most one tick, never re-entrant
//! - Only frames that arrive while running produce ticks
//! - Simulated time advances by real time × speed
//!
//! The driver owns its scheduler. Hosts read snapshots and send intents
//! through here; nothing else mutates the simulation.

use super::config::{SimConfig, validate_speed};
use super::error::SimResult;
use super::factory::WorkOverrides;
use super::scheduler::{Scheduler, TickReport};
use super::visualizer::Snapshot;
use super::work::WorkId;
use log::trace;
use rand::Rng;
use rand::rngs::SmallRng;

/// Source of host time in milliseconds
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Hand-advanced clock for tests and headless runs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self { now: start_ms }
    }

    /// Move forward; invalid or negative steps are ignored
    pub fn advance(&mut self, ms: f64) {
        if ms.is_finite() && ms > 0.0 {
            self.now += ms;
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now
    }
}

pub struct TickDriver<R: Rng = SmallRng> {
    scheduler: Scheduler<R>,
    /// Host timestamp of the previous frame; Some while running
    last_frame: Option<f64>,
    /// Simulated time handed to the scheduler
    sim_now: f64,
    speed: f64,
    frames: u64,
}

impl TickDriver<SmallRng> {
    pub fn with_config(config: &SimConfig, fallback_seed: u64) -> SimResult<Self> {
        Ok(Self::new(
            Scheduler::with_config(config, fallback_seed)?,
            config.speed,
        ))
    }
}

impl<R: Rng> TickDriver<R> {
    /// Wrap a scheduler. A non-positive or non-finite speed falls back to 1.
    pub fn new(scheduler: Scheduler<R>, speed: f64) -> Self {
        let sim_now = scheduler.now();
        Self {
            scheduler,
            last_frame: None,
            sim_now,
            speed: if validate_speed(speed).is_ok() { speed } else { 1.0 },
            frames: 0,
        }
    }

    /// Begin producing ticks from frames after `host_now`
    pub fn start(&mut self, host_now: f64) {
        self.scheduler.start();
        self.last_frame = Some(if host_now.is_finite() { host_now } else { 0.0 });
    }

    /// Stop producing ticks. In-flight work keeps its progress.
    pub fn pause(&mut self) {
        self.scheduler.pause();
        self.last_frame = None;
    }

    /// Stop and discard all work
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.scheduler.reset();
    }

    pub fn is_running(&self) -> bool {
        self.last_frame.is_some()
    }

    /// Handle one host frame. Returns None when paused.
    pub fn frame(&mut self, host_now: f64) -> Option<TickReport> {
        let last = self.last_frame?;
        if !host_now.is_finite() {
            return None;
        }
        let real_dt = (host_now - last).max(0.0);
        self.last_frame = Some(host_now.max(last));

        let dt = real_dt * self.speed;
        self.sim_now += dt;
        self.frames += 1;
        trace!("frame {} dt={:.2}ms sim={:.1}ms", self.frames, dt, self.sim_now);

        Some(self.scheduler.tick(self.sim_now, dt))
    }

    /// Read the clock and handle one frame
    pub fn pump(&mut self, clock: &dyn Clock) -> Option<TickReport> {
        self.frame(clock.now_ms())
    }

    pub fn inject(&mut self, overrides: WorkOverrides) -> SimResult<WorkId> {
        self.scheduler.inject(overrides)
    }

    pub fn set_concurrency(&mut self, n: usize) -> SimResult<()> {
        self.scheduler.set_concurrency(n)
    }

    pub fn set_speed(&mut self, speed: f64) -> SimResult<()> {
        validate_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn sim_now(&self) -> f64 {
        self.sim_now
    }

    pub fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Variant;

    fn driver(variant: Variant) -> TickDriver {
        let config = SimConfig::for_variant(variant).with_spawn_probability(0.0);
        TickDriver::with_config(&config, 3).unwrap()
    }

    #[test]
    fn test_no_ticks_until_started() {
        let mut d = driver(Variant::Softirq);
        assert!(d.frame(16.0).is_none());
        assert_eq!(d.scheduler().ticks(), 0);

        d.start(16.0);
        assert!(d.frame(32.0).is_some());
        assert_eq!(d.scheduler().ticks(), 1);
        assert_eq!(d.sim_now(), 16.0);
    }

    #[test]
    fn test_pause_cancels_synchronously() {
        let mut d = driver(Variant::Softirq);
        d.start(0.0);
        d.frame(16.0);
        d.pause();
        assert!(!d.is_running());
        assert!(d.frame(32.0).is_none());
        assert_eq!(d.frames(), 1);
    }

    #[test]
    fn test_paused_gap_is_not_simulated() {
        let mut d = driver(Variant::Softirq);
        d.start(0.0);
        d.frame(100.0);
        d.pause();
        d.start(5000.0);
        d.frame(5016.0);
        assert_eq!(d.sim_now(), 116.0);
    }

    #[test]
    fn test_speed_scales_time() {
        let mut d = driver(Variant::Workqueue);
        d.set_speed(4.0).unwrap();
        d.start(0.0);
        d.frame(250.0);
        assert_eq!(d.sim_now(), 1000.0);
        assert!(d.set_speed(0.0).is_err());
        assert!(d.set_speed(f64::NAN).is_err());
        assert_eq!(d.speed(), 4.0);
    }

    #[test]
    fn test_bad_timestamps_ignored() {
        let mut d = driver(Variant::Tasklet);
        d.start(100.0);
        assert!(d.frame(f64::NAN).is_none());
        d.frame(50.0);
        assert_eq!(d.sim_now(), 0.0);
        d.frame(116.0);
        assert_eq!(d.sim_now(), 16.0);
    }

    #[test]
    fn test_pump_reads_clock() {
        let mut d = driver(Variant::Softirq);
        let mut clock = ManualClock::new(1000.0);
        d.start(clock.now_ms());
        d.inject(WorkOverrides::default().with_duration(1)).unwrap();

        clock.advance(16.0);
        let r = d.pump(&clock).unwrap();
        assert_eq!(r.dispatched.len(), 1);

        clock.advance(100.0);
        let r = d.pump(&clock).unwrap();
        assert_eq!(r.completed.len(), 1);
    }

    #[test]
    fn test_reset_stops() {
        let mut d = driver(Variant::Workqueue);
        d.start(0.0);
        d.inject(WorkOverrides::default()).unwrap();
        d.frame(16.0);
        d.reset();
        assert!(!d.is_running());
        assert!(!d.scheduler().is_running());
        assert_eq!(d.scheduler().occupied(), 0);
    }
}
