//! In-process connection pair built on Tokio channels.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{StreamExt, sink, stream};
use tokio::sync::mpsc;

use crate::{Connection, Frame, FrameSink, FrameStream, TransportError};

/// Counter for generating readable peer labels.
static NEXT_MEMORY_PEER: AtomicU64 = AtomicU64::new(1);

/// Server end of an in-memory connection.
pub struct MemoryConnection {
    label: String,
    to_peer: mpsc::UnboundedSender<Frame>,
    from_peer: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Client end of an in-memory connection.
///
/// Dropping the peer closes both directions: the server's read stream
/// ends and its writes start failing.
pub struct MemoryPeer {
    to_server: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_server: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (to_peer, from_server) = mpsc::unbounded_channel();
        let (to_server, from_peer) = mpsc::unbounded_channel();
        let n = NEXT_MEMORY_PEER.fetch_add(1, Ordering::Relaxed);
        let conn = MemoryConnection {
            label: format!("memory-{n}"),
            to_peer,
            from_peer,
        };
        let peer = MemoryPeer {
            to_server: Some(to_server),
            from_server,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    fn peer_addr(&self) -> String {
        self.label.clone()
    }

    fn split(self) -> (FrameSink, FrameStream) {
        let sink = sink::unfold(self.to_peer, |tx, frame: Frame| async move {
            tx.send(frame).map_err(|_| {
                TransportError::ConnectionClosed("memory peer dropped".into())
            })?;
            Ok::<_, TransportError>(tx)
        });

        let stream = stream::unfold(self.from_peer, |mut rx| async move {
            let data = rx.recv().await?;
            Some((Ok::<_, TransportError>(data), rx))
        });

        (Box::pin(sink), stream.boxed())
    }
}

impl MemoryPeer {
    /// Sends one data frame to the server.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let tx = self.to_server.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("peer hung up".into())
        })?;
        tx.send(data.into()).map_err(|_| {
            TransportError::ConnectionClosed("server end dropped".into())
        })
    }

    /// Waits for the next frame from the server.
    ///
    /// Returns `None` once the server end is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_server.recv().await
    }

    /// Returns the next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_server.try_recv().ok()
    }

    /// Closes the client-to-server direction only.
    ///
    /// The server sees its read stream end, while frames it already sent
    /// can still be read here.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }
}
