//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt, future, stream};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{
    CLOSE_REASON, Connection, Frame, FrameSink, FrameStream, Transport,
    TransportError,
};

/// How long a client gets to finish the upgrade before it is dropped.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Only upgrade requests for the configured path are accepted; anything
/// else is answered with `404 Not Found`.
pub struct WebSocketTransport {
    listener: TcpListener,
    path: String,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address, serving
    /// upgrades on `path`.
    pub async fn bind(addr: &str, path: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, path, "WebSocket transport listening");
        Ok(Self {
            listener,
            path: path.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Overrides the upgrade handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is actually bound to.
    ///
    /// Useful after binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let path = self.path.clone();
        let check_path =
            move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                if req.uri().path() == path {
                    return Ok(resp);
                }
                let mut rejection = ErrorResponse::new(Some(format!(
                    "no endpoint at {}",
                    req.uri().path()
                )));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            };

        let upgrade = tokio_tungstenite::accept_hdr_async(stream, check_path);
        let ws = tokio::time::timeout(self.handshake_timeout, upgrade)
            .await
            .map_err(|_| {
                TransportError::AcceptFailed(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "websocket handshake timed out",
                ))
            })?
            .map_err(|e| {
                TransportError::AcceptFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        tracing::debug!(%addr, "accepted WebSocket connection");
        Ok(WebSocketConnection { peer: addr, ws })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    peer: SocketAddr,
    ws: WebSocketStream<TcpStream>,
}

impl Connection for WebSocketConnection {
    fn peer_addr(&self) -> String {
        self.peer.to_string()
    }

    fn split(self) -> (FrameSink, FrameStream) {
        let (sink, stream) = self.ws.split();

        let sink = sink
            .sink_map_err(|e| {
                TransportError::SendFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
            .with(|frame: Frame| {
                future::ready(Ok::<_, TransportError>(into_message(frame)))
            });

        let stream = stream::unfold(stream, |mut stream| async move {
            loop {
                match stream.next().await? {
                    Ok(Message::Text(text)) => {
                        return Some((Ok(text.as_bytes().to_vec()), stream));
                    }
                    Ok(Message::Binary(data)) => {
                        return Some((Ok(data.into()), stream));
                    }
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => continue, // skip ping/pong/raw frames
                    Err(e) => {
                        let err = TransportError::ReceiveFailed(
                            io::Error::new(io::ErrorKind::ConnectionReset, e),
                        );
                        return Some((Err(err), stream));
                    }
                }
            }
        });

        (Box::pin(sink), stream.boxed())
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping => Message::Ping(Vec::<u8>::new().into()),
        Frame::Close => Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: String::from(CLOSE_REASON).into(),
        })),
    }
}
