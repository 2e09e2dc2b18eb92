//! The mediator: sole owner of the connection and room registries.
//!
//! Sessions, rooms and the matchmaker never touch the registries
//! themselves. They push [`MediatorEvent`]s into the server queue, and the
//! mediator applies them during the tick, right after every room has
//! drained its own queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gridplay_protocol::{ConnectionId, RoomId, ServerMessage};
use gridplay_room::{Game, Room, RoomEffect, Seat};
use gridplay_session::{Disconnected, Session, SessionEvent};
use gridplay_sync::{Handler, Synchronizer, fatal};
use parking_lot::Mutex;

use crate::matchmaker::{Liveness, Matched, Matchmaker};

/// Where an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A session loop, or a room acting for its sessions.
    Session,
    Matchmaker,
}

/// The events the mediator knows how to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Deliver `message` to `connection`.
    SendMessage {
        connection: ConnectionId,
        message: ServerMessage,
    },
    /// An unbound session's link went away.
    Disconnect { connection: ConnectionId },
    /// A room vacated `connection`'s seat.
    SeatLeft { connection: ConnectionId },
    /// A room finished. `survivor` is still seated in it.
    RemoveRoom {
        room: RoomId,
        survivor: Option<ConnectionId>,
    },
    /// The matchmaker paired two live connections.
    PlayersMatched { players: [ConnectionId; 2] },
}

/// A [`ServerEvent`] tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct MediatorEvent {
    pub origin: Origin,
    pub event: ServerEvent,
}

impl From<Disconnected> for MediatorEvent {
    fn from(Disconnected { connection }: Disconnected) -> Self {
        Self {
            origin: Origin::Session,
            event: ServerEvent::Disconnect { connection },
        }
    }
}

impl From<RoomEffect> for MediatorEvent {
    fn from(effect: RoomEffect) -> Self {
        let event = match effect {
            RoomEffect::Send {
                connection,
                message,
            } => ServerEvent::SendMessage {
                connection,
                message,
            },
            RoomEffect::Left { connection } => ServerEvent::SeatLeft { connection },
            RoomEffect::Finished { room, survivor } => {
                ServerEvent::RemoveRoom { room, survivor }
            }
        };
        Self {
            origin: Origin::Session,
            event,
        }
    }
}

impl From<Matched> for MediatorEvent {
    fn from(Matched { players }: Matched) -> Self {
        Self {
            origin: Origin::Matchmaker,
            event: ServerEvent::PlayersMatched { players },
        }
    }
}

/// Connection identity → session.
///
/// The lock is held only for the map operation itself. Callers get an
/// `Arc<Session>` back and do any I/O after the lock is released.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.lock().insert(session.id(), session);
    }

    pub fn get(&self, connection: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&connection).cloned()
    }

    pub fn remove(&self, connection: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.lock().remove(&connection)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn take_all(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().drain().map(|(_, s)| s).collect()
    }
}

impl Liveness for SessionRegistry {
    fn is_alive(&self, connection: ConnectionId) -> bool {
        self.get(connection).is_some_and(|s| s.ping().is_ok())
    }
}

/// Routes every server event and owns the registries.
pub struct Mediator<G: Game> {
    sessions: Arc<SessionRegistry>,
    rooms: Mutex<HashMap<RoomId, Room<G>>>,
    inbox: Arc<Synchronizer<MediatorEvent>>,
    matchmaker: Arc<Matchmaker>,
    room_queue_capacity: usize,
    closed: AtomicBool,
    // Held while admitting a session and while closing.
    admission: Mutex<()>,
}

impl<G: Game> Mediator<G> {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        inbox: Arc<Synchronizer<MediatorEvent>>,
        matchmaker: Arc<Matchmaker>,
        room_queue_capacity: usize,
    ) -> Self {
        Self {
            sessions,
            rooms: Mutex::new(HashMap::new()),
            inbox,
            matchmaker,
            room_queue_capacity,
            closed: AtomicBool::new(false),
            admission: Mutex::new(()),
        }
    }

    /// Registers `session` and starts its loop.
    ///
    /// Returns `false`, leaving the session untouched, once the mediator
    /// has been closed.
    pub fn admit(&self, session: Arc<Session>) -> bool {
        let _admission = self.admission.lock();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.sessions.insert(Arc::clone(&session));
        let server: Arc<dyn Handler<Disconnected>> = self.inbox.clone();
        session.start(server);
        true
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// One tick: drain every room, then the server queue.
    ///
    /// Returns the number of events applied. Events a room or the
    /// mediator produce along the way are applied in the same call.
    pub fn update(&self) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let from_rooms: usize = self.rooms.lock().values_mut().map(Room::update).sum();
        from_rooms + self.inbox.drain_all(|event| self.dispatch(event))
    }

    /// Stops every session and forgets every room.
    ///
    /// Later ticks apply nothing.
    pub fn close(&self) {
        let sessions = {
            let _admission = self.admission.lock();
            self.closed.store(true, Ordering::Release);
            self.sessions.take_all()
        };
        let rooms = std::mem::take(&mut *self.rooms.lock());
        tracing::info!(rooms = rooms.len(), connections = sessions.len(), "closing all connections");
        for session in sessions {
            session.stop();
        }
    }

    fn dispatch(&self, MediatorEvent { origin, event }: MediatorEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match (origin, event) {
            (Origin::Session, ServerEvent::SendMessage { connection, message }) => {
                self.deliver(connection, &message);
            }
            (Origin::Session, ServerEvent::Disconnect { connection }) => {
                self.disconnect(connection);
            }
            (Origin::Session, ServerEvent::SeatLeft { connection }) => {
                match self.sessions.remove(connection) {
                    Some(session) => self.tear_down(session),
                    None => fatal!("room vacated an unknown connection", connection = connection),
                }
            }
            (Origin::Session, ServerEvent::RemoveRoom { room, survivor }) => {
                self.remove_room(room, survivor);
            }
            (Origin::Matchmaker, ServerEvent::PlayersMatched { players }) => {
                self.open_room(players);
            }
            (origin, event) => {
                tracing::warn!(?origin, ?event, "unhandled mediator event");
            }
        }
    }

    fn deliver(&self, connection: ConnectionId, message: &ServerMessage) {
        let Some(session) = self.sessions.get(connection) else {
            tracing::warn!(%connection, ?message, "message for unknown connection dropped");
            return;
        };
        if let Err(e) = session.send(message) {
            tracing::warn!(%connection, error = %e, "send failed");
        }
    }

    /// An unbound session went away. It may have been seated in a room
    /// since, in which case the room gets the disconnect instead.
    fn disconnect(&self, connection: ConnectionId) {
        let Some(session) = self.sessions.get(connection) else {
            tracing::debug!(%connection, "disconnect for unknown connection");
            return;
        };
        match session.forward(SessionEvent::Disconnect) {
            Ok(()) => {
                tracing::debug!(%connection, "disconnect handed to the room seated since");
            }
            Err(_) => {
                self.sessions.remove(connection);
                self.tear_down(session);
            }
        }
    }

    fn tear_down(&self, session: Arc<Session>) {
        session.stop();
        tracing::info!(
            connection = %session.id(),
            remaining = self.sessions.len(),
            "connection removed"
        );
    }

    fn open_room(&self, players: [ConnectionId; 2]) {
        let sessions = players.map(|c| self.sessions.get(c).filter(|s| s.ping().is_ok()));
        match sessions {
            [Some(first), Some(second)] => {
                let id = RoomId::generate();
                let outbox: Arc<dyn Handler<RoomEffect>> = self.inbox.clone();
                let room = Room::new(
                    id,
                    players,
                    G::new_match(),
                    self.room_queue_capacity,
                    outbox,
                );
                first.bind(room.seat_handler(Seat::FIRST));
                second.bind(room.seat_handler(Seat::SECOND));
                self.rooms.lock().insert(id, room);
            }
            [Some(survivor), None] | [None, Some(survivor)] => {
                tracing::debug!(connection = %survivor.id(), "partner gone before room creation");
                self.matchmaker.add(survivor.id());
            }
            [None, None] => {
                tracing::debug!(?players, "both gone before room creation");
            }
        }
    }

    /// Drops a finished room and hands its survivor back to matchmaking.
    ///
    /// The survivor may have queued events after the room asked to be
    /// removed. They are applied before the room goes away: a move gets
    /// its "game has ended" answer and a disconnect vacates the seat.
    fn remove_room(&self, room: RoomId, survivor: Option<ConnectionId>) {
        let Some(mut removed) = self.rooms.lock().remove(&room) else {
            // A room emptied by the drain below reports itself again.
            tracing::debug!(%room, "room already removed");
            return;
        };

        let session = survivor.and_then(|c| self.sessions.get(c));
        if let Some(session) = &session {
            session.release();
        }
        removed.update();
        let seated = survivor.is_some_and(|c| {
            Seat::BOTH.into_iter().any(|seat| removed.occupant(seat) == Some(c))
        });
        drop(removed);
        tracing::info!(%room, rooms = self.room_count(), "room removed");

        let Some(session) = session else {
            if let Some(connection) = survivor {
                tracing::debug!(%connection, "survivor already gone");
            }
            return;
        };
        let connection = session.id();
        if !seated {
            tracing::debug!(%connection, "survivor left with the room");
            return;
        }
        if session.ping().is_ok() {
            tracing::info!(%connection, "survivor back in matchmaking");
            self.matchmaker.add(connection);
        } else if self.sessions.remove(connection).is_some() {
            // Its disconnect may have reached the room after the drain.
            self.tear_down(session);
        }
    }
}
