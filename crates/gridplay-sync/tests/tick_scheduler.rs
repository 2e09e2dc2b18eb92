//! Integration tests for the fixed-rate tick scheduler.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle, which makes `sleep_until` resolve deterministically.

use std::time::Duration;

use gridplay_sync::{TickConfig, TickScheduler};

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_50ms() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval, Duration::from_millis(50));
}

#[test]
fn test_validated_clamps_tiny_interval() {
    let cfg = TickConfig::with_interval(Duration::from_micros(10)).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_orders_thresholds() {
    let cfg = TickConfig {
        budget_warn_threshold: 0.9,
        budget_critical_threshold: 0.5,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 0.5);
}

// =========================================================================
// Tick firing
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(TickConfig::default());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.interval(), Duration::from_millis(50));
    assert_eq!(s.metrics().total_ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_after_one_interval() {
    let mut s = TickScheduler::new(TickConfig::default());
    let start = tokio::time::Instant::now();

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increment_monotonically() {
    let mut s = TickScheduler::new(TickConfig::default());
    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
    assert_eq!(s.metrics().total_ticks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_late_wakeup_skips_ahead_instead_of_bursting() {
    let mut s = TickScheduler::new(TickConfig::default());
    s.wait_for_tick().await;

    // Stall for three and a half intervals without polling the scheduler.
    tokio::time::advance(Duration::from_millis(175)).await;

    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);

    // The next deadline restarts from now, so it is a full interval away.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert!(before.elapsed() >= Duration::from_millis(50));
    assert_eq!(s.metrics().total_overruns, 1);
}

// =========================================================================
// Budget accounting
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(TickConfig::default());
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_tracks_work_time() {
    let mut s = TickScheduler::new(TickConfig::default());

    // record_tick_end measures wall-clock time, not Tokio's paused clock.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    let m = s.metrics();
    assert!(m.max_tick_time > Duration::ZERO);
    assert!(m.budget_utilization > 0.0);
    assert!(m.budget_utilization < 1.0);
}

// =========================================================================
// Driving loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = TickScheduler::new(TickConfig::default());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut updates = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.wait_for_tick() => {
                updates += 1;
                s.record_tick_end();
                assert_eq!(info.tick, updates);
            }
        }
    }

    assert_eq!(updates, 3);
}
