//! Integration tests for the deferlab simulator
//!
//! Drives whole simulations through the tick driver with a manual clock,
//! the same way a host does.

use deferlab::kernel::{
    Clock, ManualClock, Priority, SimConfig, SimError, Snapshot, TickDriver, Variant,
    WorkOverrides, WorkState,
};

/// Driver with spontaneous spawning off, started at t=0
fn quiet(variant: Variant) -> (TickDriver, ManualClock) {
    let config = SimConfig::for_variant(variant)
        .with_spawn_probability(0.0)
        .with_seed(99);
    let mut driver = TickDriver::with_config(&config, 0).unwrap();
    let clock = ManualClock::new(0.0);
    driver.start(clock.now_ms());
    (driver, clock)
}

/// Advance `frames` frames of `ms` each
fn run(driver: &mut TickDriver, clock: &mut ManualClock, frames: u32, ms: f64) {
    for _ in 0..frames {
        clock.advance(ms);
        driver.pump(&*clock);
    }
}

// ============================================================================
// Softirq
// ============================================================================

#[test]
fn test_softirq_burst_fills_four_cpus() {
    let (mut driver, mut clock) = quiet(Variant::Softirq);
    for _ in 0..5 {
        driver.inject(WorkOverrides::default()).unwrap();
    }
    run(&mut driver, &mut clock, 1, 16.0);

    let snap = driver.snapshot();
    assert_eq!(snap.occupied(), 4);
    assert_eq!(snap.pending_total, 1);
    assert!(snap.completed.is_empty());
    assert_eq!(snap.stats.total_injected, 5);
}

#[test]
fn test_softirq_drains_in_fifo_order() {
    let (mut driver, mut clock) = quiet(Variant::Softirq);
    let ids: Vec<_> = (0..8)
        .map(|_| driver.inject(WorkOverrides::default().with_duration(1)).unwrap())
        .collect();
    run(&mut driver, &mut clock, 40, 16.0);

    let snap = driver.snapshot();
    assert_eq!(snap.stats.total_completed, 8);
    let mut order: Vec<u64> = snap.completed.iter().map(|i| i.id).collect();
    order.reverse();
    assert_eq!(order, ids.iter().map(|id| id.0).collect::<Vec<_>>());
}

// ============================================================================
// Tasklet
// ============================================================================

#[test]
fn test_tasklet_high_overtakes_normals() {
    let (mut driver, mut clock) = quiet(Variant::Tasklet);
    for _ in 0..6 {
        driver
            .inject(WorkOverrides::priority(Priority::Normal).with_duration(3))
            .unwrap();
    }
    let high = driver
        .inject(WorkOverrides::priority(Priority::High).with_duration(3))
        .unwrap();

    clock.advance(16.0);
    let report = driver.pump(&clock).unwrap();
    assert_eq!(report.dispatched.first(), Some(&(high, 0)));

    let snap = driver.snapshot();
    assert_eq!(snap.pending_total, 3);
    assert!(snap.pending.iter().all(|i| i.priority == Priority::Normal));
}

#[test]
fn test_tasklet_priority_tallies() {
    let (mut driver, _) = quiet(Variant::Tasklet);
    driver.inject(WorkOverrides::priority(Priority::High)).unwrap();
    driver.inject(WorkOverrides::priority(Priority::High)).unwrap();
    driver.inject(WorkOverrides::priority(Priority::Normal)).unwrap();
    let stats = driver.scheduler().stats();
    assert_eq!(stats.priority_count(Priority::High), 2);
    assert_eq!(stats.priority_count(Priority::Normal), 1);
}

// ============================================================================
// Workqueue
// ============================================================================

#[test]
fn test_workqueue_sleeper_completes_after_one_sleep() {
    let (mut driver, mut clock) = quiet(Variant::Workqueue);
    let id = driver
        .inject(WorkOverrides::default().with_duration(3).with_sleep(2))
        .unwrap();

    let mut saw_sleep = false;
    for _ in 0..400 {
        clock.advance(50.0);
        if let Some(report) = driver.pump(&clock) {
            saw_sleep |= report.slept.contains(&id);
        }
        if driver.scheduler().stats().total_completed == 1 {
            break;
        }
    }

    assert!(saw_sleep);
    let snap = driver.snapshot();
    let done = &snap.completed[0];
    assert_eq!(done.id, id.0);
    assert!(done.has_slept);
    assert_eq!(done.state, WorkState::Completed);
    // 3 s of work plus 2 s asleep
    assert!(done.latency_ms.unwrap() >= 5000.0);
}

#[test]
fn test_workqueue_resize_to_eight() {
    let (mut driver, mut clock) = quiet(Variant::Workqueue);
    for _ in 0..10 {
        driver
            .inject(WorkOverrides::default().with_duration(12).without_sleep())
            .unwrap();
    }
    run(&mut driver, &mut clock, 1, 16.0);
    assert_eq!(driver.snapshot().occupied(), 4);

    driver.set_concurrency(8).unwrap();
    run(&mut driver, &mut clock, 1, 16.0);
    let snap = driver.snapshot();
    assert_eq!(snap.concurrency, 8);
    assert_eq!(snap.occupied(), 8);
    assert_eq!(snap.pending_total, 2);
    assert_eq!(snap.slots[7].label, "Worker 7");
}

#[test]
fn test_fixed_slot_variants_refuse_resize() {
    for variant in [Variant::Softirq, Variant::Tasklet] {
        let (mut driver, _) = quiet(variant);
        assert_eq!(
            driver.set_concurrency(8),
            Err(SimError::FixedConcurrency(variant))
        );
    }
}

#[test]
fn test_workqueue_dispatches_by_priority() {
    let (mut driver, mut clock) = quiet(Variant::Workqueue);
    driver.set_concurrency(1).unwrap();
    let low = driver.inject(WorkOverrides::priority(Priority::Low)).unwrap();
    let normal = driver.inject(WorkOverrides::priority(Priority::Normal)).unwrap();
    let high = driver.inject(WorkOverrides::priority(Priority::High)).unwrap();

    run(&mut driver, &mut clock, 1, 16.0);
    let snap = driver.snapshot();
    assert_eq!(snap.slots[0].item.as_ref().map(|i| i.id), Some(high.0));
    let pending: Vec<u64> = snap.pending.iter().map(|i| i.id).collect();
    assert_eq!(pending, vec![normal.0, low.0]);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_pause_freezes_then_resumes() {
    let (mut driver, mut clock) = quiet(Variant::Softirq);
    driver.inject(WorkOverrides::default().with_duration(5)).unwrap();
    run(&mut driver, &mut clock, 10, 16.0);
    driver.pause();

    let before = driver.snapshot();
    run(&mut driver, &mut clock, 100, 16.0);
    let after = driver.snapshot();
    assert_eq!(before.ticks, after.ticks);
    assert_eq!(before.now, after.now);
    assert_eq!(after.occupied(), 1);

    driver.start(clock.now_ms());
    run(&mut driver, &mut clock, 40, 16.0);
    assert_eq!(driver.snapshot().stats.total_completed, 1);
}

#[test]
fn test_reset_mid_run() {
    let config = SimConfig::for_variant(Variant::Workqueue)
        .with_spawn_probability(0.5)
        .with_seed(4);
    let mut driver = TickDriver::with_config(&config, 0).unwrap();
    let mut clock = ManualClock::new(0.0);
    driver.start(clock.now_ms());
    run(&mut driver, &mut clock, 200, 16.0);
    assert!(driver.scheduler().stats().total_injected > 0);

    driver.reset();
    let snap = driver.snapshot();
    assert!(!snap.running);
    assert_eq!(snap.occupied(), 0);
    assert_eq!(snap.pending_total, 0);
    assert!(snap.completed.is_empty());
    assert_eq!(snap.stats.total_injected, 0);
    assert!(snap.stats.by_category.iter().all(|c| c.count == 0));
}

#[test]
fn test_spawning_only_while_running() {
    let config = SimConfig::for_variant(Variant::Tasklet)
        .with_spawn_probability(1.0)
        .with_seed(8);
    let mut driver = TickDriver::with_config(&config, 0).unwrap();
    let mut clock = ManualClock::new(0.0);
    run(&mut driver, &mut clock, 10, 16.0);
    assert_eq!(driver.scheduler().stats().total_injected, 0);

    driver.start(clock.now_ms());
    run(&mut driver, &mut clock, 10, 16.0);
    assert_eq!(driver.scheduler().stats().total_injected, 10);
}

#[test]
fn test_history_is_bounded() {
    let config = SimConfig::for_variant(Variant::Softirq)
        .with_spawn_probability(1.0)
        .with_seed(12);
    let mut driver = TickDriver::with_config(&config, 0).unwrap();
    let mut clock = ManualClock::new(0.0);
    driver.start(clock.now_ms());
    run(&mut driver, &mut clock, 2000, 100.0);

    let snap = driver.snapshot();
    assert!(snap.stats.total_completed > 100);
    assert_eq!(snap.completed.len(), 100);
    assert_eq!(driver.scheduler().completed().evicted(), snap.stats.total_completed - 100);
}

// ============================================================================
// Host boundary
// ============================================================================

#[test]
fn test_config_json_drives_simulation() {
    let config = SimConfig::from_json(
        r#"{"variant":"workqueue","concurrency":2,"spawn_probability":0,"speed":10,"seed":5}"#,
    )
    .unwrap();
    let mut driver = TickDriver::with_config(&config, 0).unwrap();
    let mut clock = ManualClock::new(0.0);
    driver.start(clock.now_ms());
    driver
        .inject(WorkOverrides::default().with_duration(3).without_sleep())
        .unwrap();

    // 10x speed: 3 s of work in about 300 ms of host time
    run(&mut driver, &mut clock, 25, 16.0);
    let snap = driver.snapshot();
    assert_eq!(snap.concurrency, 2);
    assert_eq!(snap.stats.total_completed, 1);
}

#[test]
fn test_snapshot_json_roundtrips_shape() {
    let (mut driver, mut clock) = quiet(Variant::Tasklet);
    driver
        .inject(WorkOverrides::from_hints(Variant::Tasklet, Some("net"), Some("high")).unwrap())
        .unwrap();
    run(&mut driver, &mut clock, 1, 16.0);

    let json = driver.snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["variant"], "tasklet");
    assert_eq!(value["running"], true);
    assert_eq!(value["slots"][0]["item"]["category"], "net");
    assert_eq!(value["slots"][0]["item"]["priority"], "high");
    assert_eq!(value["slots"][0]["item"]["state"], "active");
}

#[test]
fn test_same_seed_same_run() {
    let snapshot = || {
        let config = SimConfig::for_variant(Variant::Workqueue).with_seed(2024);
        let mut driver = TickDriver::with_config(&config, 0).unwrap();
        let mut clock = ManualClock::new(0.0);
        driver.start(clock.now_ms());
        run(&mut driver, &mut clock, 500, 16.0);
        driver.snapshot().to_json().unwrap()
    };
    assert_eq!(snapshot(), snapshot());
}

#[test]
fn test_render_ascii_lists_history() {
    let (mut driver, mut clock) = quiet(Variant::Softirq);
    for _ in 0..7 {
        driver.inject(WorkOverrides::default().with_duration(1)).unwrap();
    }
    run(&mut driver, &mut clock, 30, 16.0);
    let text = Snapshot::capture(driver.scheduler()).render_ascii();
    assert!(text.contains("COMPLETED (7)"));
    assert!(text.contains("... and 2 more"));
}
