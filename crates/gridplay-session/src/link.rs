//! The link: one transport connection with a writer task and a reader task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use gridplay_protocol::{
    ClientMessage, Codec, JsonCodec, ProtocolError, ServerMessage,
};
use gridplay_sync::fatal;
use gridplay_transport::{Connection, Frame, FrameSink, FrameStream};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::SessionError;

/// What a started reader hands back.
///
/// `messages` yields every decoded inbound message in arrival order. `exit`
/// resolves exactly once, after the last message, when the read side is
/// gone.
pub struct Inbound {
    pub messages: mpsc::Receiver<ClientMessage>,
    pub exit: oneshot::Receiver<()>,
}

/// A duplex connection wrapped for the session that owns it.
///
/// Writes never block the caller. They are queued to a writer task, so
/// `send` and `ping` are safe to call from the tick. The first failed
/// write, or the end of the read side, sets a sticky `broken` flag and
/// every send after that fails immediately.
pub struct Link {
    peer: String,
    codec: JsonCodec,
    outbound: mpsc::UnboundedSender<Frame>,
    broken: Arc<AtomicBool>,
    receiving: Arc<AtomicBool>,
    reader: Mutex<Option<FrameStream>>,
    inbound_capacity: usize,
}

impl Link {
    /// Splits `conn` and spawns its writer task.
    ///
    /// Must be called from inside a Tokio runtime. `inbound_capacity`
    /// bounds how many decoded messages may wait for the session loop.
    pub fn new<C: Connection>(conn: C, inbound_capacity: usize) -> Self {
        let peer = conn.peer_addr();
        let (sink, stream) = conn.split();
        let (outbound, frames) = mpsc::unbounded_channel();
        let broken = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_frames(
            sink,
            frames,
            Arc::clone(&broken),
            peer.clone(),
        ));

        Self {
            peer,
            codec: JsonCodec,
            outbound,
            broken,
            receiving: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(Some(stream)),
            inbound_capacity: inbound_capacity.max(1),
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::Acquire)
    }

    /// Encodes and queues one message. Best-effort.
    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        if self.is_broken() {
            return Err(SessionError::Broken);
        }
        let bytes = self.codec.encode_message(message)?;
        // serde_json only ever produces UTF-8.
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.write(Frame::Text(text))
    }

    /// Queues a ping.
    ///
    /// Success means the link was not known to be broken at this instant.
    /// Nothing waits for a pong.
    pub fn ping(&self) -> Result<(), SessionError> {
        if self.is_broken() {
            return Err(SessionError::Broken);
        }
        self.write(Frame::Ping)
    }

    /// Spawns the reader task.
    ///
    /// A link has exactly one read side, so a second call is fatal.
    pub fn start_receiving(&self) -> Inbound {
        let Some(stream) = self.reader.lock().take() else {
            fatal!("link started receiving twice", peer = self.peer)
        };
        self.receiving.store(true, Ordering::Release);

        let (messages_tx, messages) = mpsc::channel(self.inbound_capacity);
        let (exit_tx, exit) = oneshot::channel();
        tokio::spawn(read_frames(
            stream,
            messages_tx,
            exit_tx,
            self.codec,
            Arc::clone(&self.broken),
            Arc::clone(&self.receiving),
            self.peer.clone(),
        ));

        Inbound { messages, exit }
    }

    /// Starts a graceful close if the reader is still running.
    ///
    /// The reader ends once the peer answers the close, which fires the
    /// exit signal as usual.
    pub fn stop_receiving(&self) {
        if self.is_receiving() {
            tracing::debug!(peer = %self.peer, "closing link");
            let _ = self.write(Frame::Close);
        }
    }

    fn write(&self, frame: Frame) -> Result<(), SessionError> {
        self.outbound.send(frame).map_err(|_| {
            self.broken.store(true, Ordering::Release);
            SessionError::Broken
        })
    }
}

async fn write_frames(
    mut sink: FrameSink,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    broken: Arc<AtomicBool>,
    peer: String,
) {
    while let Some(frame) = frames.recv().await {
        let closing = frame == Frame::Close;
        if let Err(e) = sink.send(frame).await {
            broken.store(true, Ordering::Release);
            tracing::debug!(%peer, error = %e, "write failed, link broken");
            return;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_frames(
    mut stream: FrameStream,
    messages: mpsc::Sender<ClientMessage>,
    exit: oneshot::Sender<()>,
    codec: JsonCodec,
    broken: Arc<AtomicBool>,
    receiving: Arc<AtomicBool>,
    peer: String,
) {
    while let Some(item) = stream.next().await {
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "read failed");
                break;
            }
        };
        match codec.decode_message::<ClientMessage>(&bytes) {
            Ok(message) => {
                if messages.send(message).await.is_err() {
                    break;
                }
            }
            Err(ProtocolError::UnknownType(kind)) => {
                tracing::warn!(%peer, kind, "dropping message of unknown type");
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping malformed message");
            }
        }
    }

    broken.store(true, Ordering::Release);
    receiving.store(false, Ordering::Release);
    tracing::debug!(%peer, "read side closed");
    let _ = exit.send(());
}
