//! Tick-time synchronization for Gridplay.
//!
//! Connections, the matchmaker and rooms all run concurrently, but every
//! mutation of room or server state happens on one logical thread: the
//! periodic tick. This crate has the three pieces that make that work:
//!
//! - [`Synchronizer`]: a bounded multi-producer queue with one
//!   non-blocking [`drain_all`](Synchronizer::drain_all) per tick.
//! - [`TickScheduler`]: the fixed-rate driver that decides when a tick
//!   runs.
//! - [`fatal!`] / [`invariant!`]: what happens when the single-writer
//!   discipline is broken anyway.

pub mod invariant;
mod synchronizer;
mod tick;

pub use synchronizer::{Handler, Synchronizer};
pub use tick::{TickConfig, TickInfo, TickMetrics, TickScheduler};
