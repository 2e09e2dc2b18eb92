//! FIFO pairing of idle connections.
//!
//! Connections are queued with [`Matchmaker::add`]. A background task
//! takes them two at a time in arrival order and checks that both still
//! answer a ping. What happens next depends only on that check, see
//! [`resolve`]:
//!
//! | first | second | result                               |
//! |-------|--------|--------------------------------------|
//! | alive | alive  | [`Matched`] is emitted, first = seat 0 |
//! | alive | dead   | first goes to the back of the queue  |
//! | dead  | alive  | second goes to the back of the queue |
//! | dead  | dead   | both are dropped                     |
//!
//! Dropped connections are not cleaned up here. Their own exit path
//! removes them from the server.

use std::sync::Arc;

use gridplay_protocol::ConnectionId;
use gridplay_sync::{Handler, fatal, invariant};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Answers "is this connection reachable right now".
pub trait Liveness: Send + Sync {
    fn is_alive(&self, connection: ConnectionId) -> bool;
}

/// Two live connections paired in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matched {
    pub players: [ConnectionId; 2],
}

/// What to do with one popped pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    Matched([ConnectionId; 2]),
    Requeue(ConnectionId),
    Dropped,
}

/// Decides a pair's fate from the liveness of each member.
pub fn resolve(pair: [ConnectionId; 2], alive: [bool; 2]) -> PairOutcome {
    match alive {
        [true, true] => PairOutcome::Matched(pair),
        [true, false] => PairOutcome::Requeue(pair[0]),
        [false, true] => PairOutcome::Requeue(pair[1]),
        [false, false] => PairOutcome::Dropped,
    }
}

enum Lifecycle {
    Idle(mpsc::UnboundedReceiver<ConnectionId>),
    Running(oneshot::Sender<()>),
    Stopped,
}

/// The pairing queue and its background task.
pub struct Matchmaker {
    queue: mpsc::UnboundedSender<ConnectionId>,
    lifecycle: Mutex<Lifecycle>,
    liveness: Arc<dyn Liveness>,
    matched: Arc<dyn Handler<Matched>>,
}

impl Matchmaker {
    /// `liveness` is consulted for every pair. Each successful pair is
    /// handed to `matched`.
    pub fn new(liveness: Arc<dyn Liveness>, matched: Arc<dyn Handler<Matched>>) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        Self {
            queue,
            lifecycle: Mutex::new(Lifecycle::Idle(receiver)),
            liveness,
            matched,
        }
    }

    /// Queues `connection` for pairing.
    ///
    /// Connections added before [`start`](Self::start) wait until it runs.
    /// After [`stop`](Self::stop) they are discarded.
    pub fn add(&self, connection: ConnectionId) {
        tracing::debug!(%connection, "queued for matchmaking");
        if self.queue.send(connection).is_err() {
            tracing::debug!(%connection, "matchmaker stopped, not queued");
        }
    }

    /// Spawns the pairing task. Starting twice is fatal.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let (stop_tx, stop_rx) = oneshot::channel();
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Running(stop_tx));
        let Lifecycle::Idle(receiver) = previous else {
            fatal!("matchmaker started twice")
        };

        tokio::spawn(pair_loop(
            receiver,
            stop_rx,
            self.queue.clone(),
            Arc::clone(&self.liveness),
            Arc::clone(&self.matched),
        ));
        tracing::info!("matchmaker started");
    }

    /// Ends the pairing task. Stopping anything but a running matchmaker
    /// is fatal.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(stop) => {
                let _ = stop.send(());
                tracing::info!("matchmaker stopped");
            }
            Lifecycle::Idle(_) => fatal!("matchmaker stopped before it started"),
            Lifecycle::Stopped => fatal!("matchmaker stopped twice"),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }
}

async fn pair_loop(
    mut queue: mpsc::UnboundedReceiver<ConnectionId>,
    mut stop: oneshot::Receiver<()>,
    requeue: mpsc::UnboundedSender<ConnectionId>,
    liveness: Arc<dyn Liveness>,
    matched: Arc<dyn Handler<Matched>>,
) {
    let mut waiting: Option<ConnectionId> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop => return,
            next = queue.recv() => next,
        };
        // The loop holds a sender itself, so the queue never closes first.
        let Some(connection) = next else { return };

        let Some(first) = waiting.take() else {
            waiting = Some(connection);
            continue;
        };
        let pair = [first, connection];
        invariant!(pair[0] != pair[1], "connection queued twice for one pair", connection = connection);

        let alive = pair.map(|c| liveness.is_alive(c));
        match resolve(pair, alive) {
            PairOutcome::Matched(players) => {
                tracing::info!(seat0 = %players[0], seat1 = %players[1], "players matched");
                matched.handle(Matched { players });
            }
            PairOutcome::Requeue(survivor) => {
                tracing::debug!(%survivor, ?pair, "partner unreachable, requeueing");
                let _ = requeue.send(survivor);
            }
            PairOutcome::Dropped => {
                tracing::debug!(?pair, "both unreachable, dropping pair");
            }
        }
    }
}
