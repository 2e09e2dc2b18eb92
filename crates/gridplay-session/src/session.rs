//! The per-connection session actor.
//!
//! A session owns one [`Link`] and runs a dispatch loop that waits on three
//! things at once: the next decoded message, the link's exit signal, and
//! a one-shot stop signal from whoever owns the session.
//!
//! ```text
//!   Idle ──(bind)──→ Bound(room seat handler)
//! ```
//!
//! While **Idle**, a move is answered right away with a `not_allowed_error`
//! and nothing is queued. Once **Bound**, every event goes to the seat
//! handler. A disconnect goes to the seat handler when bound, and to the
//! server's handler otherwise.

use std::sync::Arc;

use gridplay_protocol::{ClientMessage, ConnectionId, Position, ServerMessage};
use gridplay_sync::{Handler, fatal};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::link::{Inbound, Link};
use crate::SessionError;

/// Reason sent when an idle session receives a move.
pub const NOT_RUNNING: &str = "cannot do this while game is not running";

/// An event a session hands to whoever currently owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Move(Position),
    Disconnect,
}

impl From<ClientMessage> for SessionEvent {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Move(pos) => Self::Move(pos),
        }
    }
}

/// Sent to the server when an unbound session's link goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected {
    pub connection: ConnectionId,
}

/// The handler a session is bound to once a room exists for it.
pub trait SessionHandler: Send + Sync {
    /// Takes the event, or hands it back when the handler is no longer
    /// accepting events (its room is gone). A handed-back event is treated
    /// exactly as if the session were unbound.
    fn handle(&self, event: SessionEvent) -> Result<(), SessionEvent>;
}

enum LoopState {
    Idle,
    Running(oneshot::Sender<()>),
    Stopped,
}

/// One connected client.
pub struct Session {
    id: ConnectionId,
    link: Link,
    binding: Mutex<Option<Arc<dyn SessionHandler>>>,
    state: Mutex<LoopState>,
}

impl Session {
    pub fn new(id: ConnectionId, link: Link) -> Arc<Self> {
        Arc::new(Self {
            id,
            link,
            binding: Mutex::new(None),
            state: Mutex::new(LoopState::Idle),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> &str {
        self.link.peer_addr()
    }

    /// Starts the link's reader and the dispatch loop.
    ///
    /// `server` receives the [`Disconnected`] event if the link goes away
    /// while the session is unbound. Starting twice is fatal.
    pub fn start(self: &Arc<Self>, server: Arc<dyn Handler<Disconnected>>) {
        let stop = {
            let mut state = self.state.lock();
            if !matches!(*state, LoopState::Idle) {
                fatal!("session loop started twice", connection = self.id);
            }
            let (stop_tx, stop_rx) = oneshot::channel();
            *state = LoopState::Running(stop_tx);
            stop_rx
        };
        let inbound = self.link.start_receiving();
        tokio::spawn(Arc::clone(self).run(inbound, stop, server));
    }

    /// Ends the dispatch loop and closes the link gracefully.
    ///
    /// Stopping is one-shot: stopping twice, or before `start`, is fatal.
    pub fn stop(&self) {
        let previous =
            std::mem::replace(&mut *self.state.lock(), LoopState::Stopped);
        match previous {
            LoopState::Running(stop) => {
                self.link.stop_receiving();
                // The loop may already have ended on its own exit signal.
                let _ = stop.send(());
            }
            LoopState::Idle => {
                fatal!("session stopped before it started", connection = self.id)
            }
            LoopState::Stopped => {
                fatal!("session stopped twice", connection = self.id)
            }
        }
    }

    /// Routes all later events to `handler`.
    ///
    /// Binding a session that is already bound is fatal.
    pub fn bind(&self, handler: Arc<dyn SessionHandler>) {
        let mut binding = self.binding.lock();
        if binding.is_some() {
            fatal!("session bound twice", connection = self.id);
        }
        *binding = Some(handler);
        tracing::debug!(connection = %self.id, "session bound");
    }

    /// Drops the current binding, returning the session to idle.
    ///
    /// Returns whether the session was bound.
    pub fn release(&self) -> bool {
        let released = self.binding.lock().take().is_some();
        if released {
            tracing::debug!(connection = %self.id, "session released");
        }
        released
    }

    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Hands `event` to the bound handler, or back to the caller if there
    /// is none or it no longer accepts events.
    pub fn forward(&self, event: SessionEvent) -> Result<(), SessionEvent> {
        // Clone out of the lock so the handler never runs under it.
        let handler = self.binding.lock().clone();
        match handler {
            Some(handler) => handler.handle(event),
            None => Err(event),
        }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        self.link.send(message)
    }

    pub fn ping(&self) -> Result<(), SessionError> {
        self.link.ping()
    }

    async fn run(
        self: Arc<Self>,
        mut inbound: Inbound,
        mut stop: oneshot::Receiver<()>,
        server: Arc<dyn Handler<Disconnected>>,
    ) {
        tracing::debug!(connection = %self.id, peer = %self.peer_addr(), "session loop started");
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    tracing::debug!(connection = %self.id, "session loop stopped");
                    return;
                }
                Some(message) = inbound.messages.recv() => {
                    self.dispatch(SessionEvent::from(message), server.as_ref());
                }
                _ = &mut inbound.exit => {
                    tracing::info!(connection = %self.id, "connection went away");
                    self.dispatch(SessionEvent::Disconnect, server.as_ref());
                    return;
                }
            }
        }
    }

    fn dispatch(&self, event: SessionEvent, server: &dyn Handler<Disconnected>) {
        let Err(unhandled) = self.forward(event) else {
            return;
        };
        match unhandled {
            SessionEvent::Move(pos) => {
                tracing::debug!(connection = %self.id, %pos, "move while idle");
                if let Err(e) = self.send(&ServerMessage::not_allowed(NOT_RUNNING)) {
                    tracing::debug!(connection = %self.id, error = %e, "rejection not sent");
                }
            }
            SessionEvent::Disconnect => server.handle(Disconnected {
                connection: self.id,
            }),
        }
    }
}
