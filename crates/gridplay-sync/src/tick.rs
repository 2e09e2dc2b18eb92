//! Fixed-rate tick driver.
//!
//! The server never mutates room state on its own schedule. Something
//! outside it has to call the update entry point at a steady interval,
//! and [`TickScheduler`] is that something:
//!
//! ```ignore
//! let mut ticks = TickScheduler::new(TickConfig::with_interval(Duration::from_millis(50)));
//! loop {
//!     ticks.wait_for_tick().await;
//!     server.update();
//!     ticks.record_tick_end();
//! }
//! ```
//!
//! A late wake-up never triggers a burst of catch-up ticks. The schedule
//! simply restarts from "now", since one drain empties every queue anyway.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between two ticks.
    pub interval: Duration,
    /// Fraction of the interval (0.0–1.0) above which a tick's work is
    /// reported as approaching the budget. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Fraction of the interval (0.0–1.0) above which a tick's work is
    /// reported as over budget. Default: 1.0.
    pub budget_critical_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::with_interval(Duration::from_millis(50))
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_us = self.interval.as_micros() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }
}

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number, starting at 1.
    pub tick: u64,
    /// `true` if the scheduler woke up more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals that passed without a tick because of the overrun.
    pub ticks_skipped: u64,
}

/// Counters kept across the scheduler's lifetime.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest work time reported through `record_tick_end`.
    pub max_tick_time: Duration,
    /// Work time of the last tick as a fraction of the interval.
    pub budget_utilization: f64,
}

/// Fixed-rate tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: TokioInstant,
    /// Wall-clock start of the current tick's work, set by `wait_for_tick`
    /// and consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick fires one interval from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );
        Self {
            next_tick: TokioInstant::now() + config.interval,
            config,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Sleeps until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let interval = self.config.interval;
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > interval / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / interval.as_nanos()) as u64
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = now + interval;

        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;
        if overrun {
            self.metrics.total_overruns += 1;
        }
        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick is done.
    ///
    /// Without this call no budget warnings fire. Calling it without a
    /// preceding `wait_for_tick` does nothing.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let budget = self.config.interval;
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        self.metrics.budget_utilization = utilization;
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "tick exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "tick approaching budget"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
