//! The drain queue every room and the server own one of.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::fatal;

/// Something that accepts events of type `E`.
///
/// This is the seam between producers and whoever applies their events.
/// Implementations must not block: they are called from session tasks,
/// the matchmaker loop and the tick itself.
pub trait Handler<E>: Send + Sync {
    fn handle(&self, event: E);
}

/// A bounded multi-producer queue drained once per tick.
///
/// Any number of threads may [`push`](Self::push) concurrently. Exactly one
/// place, the tick, calls [`drain_all`](Self::drain_all), which pops
/// without waiting until the queue is empty and hands each event over in
/// FIFO order. That is what turns events arriving from many connections
/// into one ordered sequence of mutations.
///
/// Overflow is not back-pressure. The capacity is sized so producers never
/// fill it between two ticks, so a full queue means the tick has stalled
/// and is treated as fatal.
pub struct Synchronizer<E> {
    name: &'static str,
    capacity: usize,
    tx: mpsc::Sender<E>,
    rx: Mutex<mpsc::Receiver<E>>,
}

impl<E: Send> Synchronizer<E> {
    /// Creates an empty queue. `name` shows up in logs and invariant dumps.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        if capacity == 0 {
            fatal!("synchronizer capacity must be positive", queue = name);
        }
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name,
            capacity,
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueues an event without blocking.
    pub fn push(&self, event: E) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => fatal!(
                "synchronizer queue overflow",
                queue = self.name,
                capacity = self.capacity,
            ),
            // The receiver lives in `self`, so it cannot be gone.
            Err(TrySendError::Closed(_)) => {
                fatal!("synchronizer receiver dropped", queue = self.name)
            }
        }
    }

    /// Pops every queued event in FIFO order and passes each to `apply`.
    ///
    /// Events pushed while the drain is running, including ones `apply`
    /// pushes itself, are drained too. Returns how many events were applied.
    ///
    /// Calling this again from inside `apply`, or from a second thread
    /// while a drain is running, is fatal.
    pub fn drain_all(&self, mut apply: impl FnMut(E)) -> usize {
        let Some(mut rx) = self.rx.try_lock() else {
            fatal!("synchronizer drained re-entrantly", queue = self.name)
        };
        let mut drained = 0;
        while let Ok(event) = rx.try_recv() {
            apply(event);
            drained += 1;
        }
        if drained > 0 {
            tracing::trace!(queue = self.name, drained, "drained synchronizer");
        }
        drained
    }

    /// Number of events currently waiting.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A synchronizer accepts anything convertible into its event type, so a
/// room can hold it as a `Handler<RoomEffect>` while the server queue
/// stores its own event enum.
impl<E, F> Handler<F> for Synchronizer<E>
where
    E: Send,
    F: Into<E>,
{
    fn handle(&self, event: F) {
        self.push(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_all_empty_queue_applies_nothing() {
        let sync: Synchronizer<u32> = Synchronizer::new("test", 4);
        let drained = sync.drain_all(|_| panic!("nothing should be applied"));
        assert_eq!(drained, 0);
    }

    #[test]
    fn test_push_then_drain_is_fifo() {
        let sync = Synchronizer::new("test", 8);
        for i in 0..5 {
            sync.push(i);
        }
        assert_eq!(sync.len(), 5);

        let mut seen = Vec::new();
        let drained = sync.drain_all(|e| seen.push(e));
        assert_eq!(drained, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(sync.is_empty());
    }

    #[test]
    fn test_drain_all_includes_events_pushed_while_draining() {
        let sync = Synchronizer::new("test", 4);
        sync.push(1);

        let mut seen = Vec::new();
        sync.drain_all(|e| {
            if e == 1 {
                sync.push(2);
            }
            seen.push(e);
        });
        assert_eq!(seen, vec![1, 2]);
        assert!(sync.is_empty());
    }

    #[test]
    fn test_handler_converts_into_event_type() {
        let sync: Synchronizer<u64> = Synchronizer::new("test", 2);
        let handler: &dyn Handler<u32> = &sync;
        handler.handle(7u32);

        let mut seen = Vec::new();
        sync.drain_all(|e| seen.push(e));
        assert_eq!(seen, vec![7u64]);
    }

    #[test]
    #[should_panic(expected = "synchronizer queue overflow")]
    fn test_push_past_capacity_is_fatal() {
        let sync = Synchronizer::new("test", 2);
        sync.push(1);
        sync.push(2);
        sync.push(3);
    }

    #[test]
    #[should_panic(expected = "synchronizer drained re-entrantly")]
    fn test_reentrant_drain_is_fatal() {
        let sync = Synchronizer::new("test", 2);
        sync.push(1);
        sync.drain_all(|_| {
            sync.drain_all(|_| {});
        });
    }

    #[test]
    #[should_panic(expected = "synchronizer capacity must be positive")]
    fn test_zero_capacity_is_fatal() {
        let _sync: Synchronizer<u8> = Synchronizer::new("test", 0);
    }
}
