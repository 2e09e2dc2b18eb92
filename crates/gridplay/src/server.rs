//! `GameServer` builder and server loop.
//!
//! This is the entry point for running a Gridplay server. It ties together
//! all the layers: transport → session → matchmaker → mediator → room.
//!
//! The server has two entry points. [`GameServer::accept`] takes a freshly
//! upgraded connection. [`GameServer::update`] is the tick, and must be
//! called on a steady interval. [`GameServer::run`] does both for a
//! [`Transport`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gridplay_protocol::ConnectionId;
use gridplay_room::Game;
use gridplay_session::{Link, Session};
use gridplay_sync::{Handler, Synchronizer, TickScheduler};
use gridplay_transport::{Connection, Transport};
use tokio::task::JoinHandle;

use crate::matchmaker::{Matched, Matchmaker};
use crate::mediator::{Mediator, MediatorEvent, SessionRegistry};
use crate::{GridplayError, ServerConfig};

/// Builder for configuring a [`GameServer`].
///
/// # Example
///
/// ```rust,no_run
/// use gridplay::prelude::*;
///
/// # async fn demo() -> Result<(), GridplayError> {
/// let server = GameServer::<TicTacToe>::builder()
///     .bind("127.0.0.1:4000")
///     .max_connections(512)
///     .build();
/// let transport = server.bind_websocket().await?;
/// server.start();
/// server.run(transport).await
/// # }
/// ```
pub struct GameServerBuilder<G: Game> {
    config: ServerConfig,
    game: PhantomData<fn() -> G>,
}

impl<G: Game> GameServerBuilder<G> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Starts from an existing configuration, e.g. one read from the
    /// environment.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            game: PhantomData,
        }
    }

    /// Sets the address the WebSocket listener binds to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets the request path accepted for upgrades.
    pub fn path(mut self, path: &str) -> Self {
        self.config.path = path.to_string();
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn room_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.room_queue_capacity = capacity;
        self
    }

    pub fn server_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.server_queue_capacity = capacity;
        self
    }

    pub fn inbound_buffer(mut self, capacity: usize) -> Self {
        self.config.inbound_buffer = capacity;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Wires up the registries, queues and matchmaker.
    ///
    /// Nothing runs until [`GameServer::start`].
    pub fn build(self) -> GameServer<G> {
        let config = self.config;
        let sessions = Arc::new(SessionRegistry::default());
        let inbox: Arc<Synchronizer<MediatorEvent>> =
            Arc::new(Synchronizer::new("server", config.server_queue_capacity));

        let matched: Arc<dyn Handler<Matched>> = inbox.clone();
        let matchmaker = Arc::new(Matchmaker::new(sessions.clone(), matched));
        let mediator = Arc::new(Mediator::new(
            sessions,
            inbox,
            Arc::clone(&matchmaker),
            config.room_queue_capacity,
        ));

        GameServer {
            config: Arc::new(config),
            mediator,
            matchmaker,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<G: Game> Default for GameServerBuilder<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// A Gridplay server hosting games of type `G`.
///
/// Cheap to clone: every clone drives the same server.
pub struct GameServer<G: Game> {
    config: Arc<ServerConfig>,
    mediator: Arc<Mediator<G>>,
    matchmaker: Arc<Matchmaker>,
    running: Arc<AtomicBool>,
}

impl<G: Game> Clone for GameServer<G> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            mediator: Arc::clone(&self.mediator),
            matchmaker: Arc::clone(&self.matchmaker),
            running: Arc::clone(&self.running),
        }
    }
}

impl<G: Game> GameServer<G> {
    /// Creates a new builder.
    pub fn builder() -> GameServerBuilder<G> {
        GameServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the WebSocket listener described by the configuration.
    pub async fn bind_websocket(
        &self,
    ) -> Result<gridplay_transport::WebSocketTransport, GridplayError> {
        let transport =
            gridplay_transport::WebSocketTransport::bind(&self.config.bind, &self.config.path)
                .await?
                .with_handshake_timeout(self.config.handshake_timeout);
        Ok(transport)
    }

    /// Starts the matchmaker. Must be called from inside a Tokio runtime.
    ///
    /// A server starts once. Starting it again is fatal.
    pub fn start(&self) {
        self.matchmaker.start();
        self.running.store(true, Ordering::Release);
        tracing::info!(
            bind = %self.config.bind,
            path = %self.config.path,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "gridplay server started"
        );
    }

    /// Stops matchmaking and closes every connection.
    ///
    /// Stopping a server that is not running is fatal.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.matchmaker.stop();
        self.mediator.close();
        tracing::info!("gridplay server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Takes ownership of a freshly upgraded connection.
    ///
    /// Returns as soon as the session is registered and queued for
    /// matchmaking. Everything after that happens on the session's own
    /// tasks and on the tick.
    pub fn accept<C: Connection>(&self, conn: C) -> Result<ConnectionId, GridplayError> {
        if !self.is_running() {
            return Err(GridplayError::NotRunning);
        }
        let max = self.config.max_connections;
        if self.mediator.connection_count() >= max {
            tracing::warn!(peer = %conn.peer_addr(), max, "connection refused, at capacity");
            return Err(GridplayError::AtCapacity(max));
        }

        let id = ConnectionId::generate();
        let session = Session::new(id, Link::new(conn, self.config.inbound_buffer));
        let peer = session.peer_addr().to_string();
        // `stop` may have closed the mediator since the check above.
        if !self.mediator.admit(session) {
            return Err(GridplayError::NotRunning);
        }
        tracing::info!(connection = %id, %peer, "connection accepted");
        self.matchmaker.add(id);
        Ok(id)
    }

    /// Runs one tick: every room's queue, then the server queue.
    ///
    /// Returns the number of events applied.
    pub fn update(&self) -> usize {
        self.mediator.update()
    }

    pub fn connection_count(&self) -> usize {
        self.mediator.connection_count()
    }

    pub fn room_count(&self) -> usize {
        self.mediator.room_count()
    }

    /// Accepts connections from `transport` and ticks at the configured
    /// rate until the server is stopped.
    ///
    /// The tick runs on its own task, so a slow handshake never delays
    /// it. Dropping the returned future stops the tick as well.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<(), GridplayError> {
        if !self.is_running() {
            return Err(GridplayError::NotRunning);
        }
        let _ticker = Ticker(tokio::spawn(self.clone().tick_loop()));
        tracing::info!("accept loop running");

        while self.is_running() {
            match transport.accept().await {
                Ok(conn) => {
                    if let Err(e) = self.accept(conn) {
                        tracing::warn!(error = %e, "connection not accepted");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }

        if let Err(e) = transport.shutdown().await {
            tracing::debug!(error = %e, "transport shutdown failed");
        }
        Ok(())
    }

    async fn tick_loop(self) {
        let mut scheduler = TickScheduler::new(self.config.tick());
        while self.is_running() {
            let info = scheduler.wait_for_tick().await;
            let applied = self.update();
            scheduler.record_tick_end();
            if applied > 0 {
                tracing::trace!(tick = info.tick, applied, "tick");
            }
        }
    }
}

/// Aborts the tick task when the accept loop goes away.
struct Ticker(JoinHandle<()>);

impl Drop for Ticker {
    fn drop(&mut self) {
        self.0.abort();
    }
}
