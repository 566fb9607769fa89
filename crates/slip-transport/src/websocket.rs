//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! A background acceptor task owns the TCP listener. Every accepted socket
//! is upgraded in its own task under a deadline, and finished connections
//! are queued for [`Transport::accept`]. A peer that opens a socket and
//! never completes the upgrade only ties up its own task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a peer gets to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgraded connections waiting for `accept()`.
const READY_QUEUE_SIZE: usize = 64;

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
    shut_down: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Like [`bind`](Self::bind), with a custom upgrade deadline.
    pub async fn bind_with_timeout(
        addr: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, ready) = mpsc::channel(READY_QUEUE_SIZE);
        let acceptor = tokio::spawn(accept_loop(listener, tx, handshake_timeout));

        Ok(Self {
            local_addr,
            ready,
            acceptor,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.ready.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.shut_down.store(true, Ordering::Release);
        self.acceptor.abort();
        Ok(())
    }
}

/// Accepts TCP sockets and hands each one to its own upgrade task.
async fn accept_loop(
    listener: TcpListener,
    ready: mpsc::Sender<WebSocketConnection>,
    handshake_timeout: Duration,
) {
    while !ready.is_closed() {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept failed");
                continue;
            }
        };

        let ready = ready.clone();
        tokio::spawn(async move {
            match upgrade(stream, handshake_timeout).await {
                Ok(conn) => {
                    tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
                    if ready.send(conn).await.is_err() {
                        tracing::debug!(%addr, "transport closed before connection was taken");
                    }
                }
                Err(e) => tracing::debug!(%addr, error = %e, "WebSocket upgrade failed"),
            }
        });
    }
}

async fn upgrade(
    stream: TcpStream,
    limit: Duration,
) -> Result<WebSocketConnection, TransportError> {
    let ws = tokio::time::timeout(limit, tokio_tungstenite::accept_async(stream))
        .await
        .map_err(|_| TransportError::HandshakeTimedOut(limit))?
        .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

/// A single WebSocket connection.
///
/// The socket is split so the read half and the write half have their
/// own locks.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // JSON frames go out as text so browsers get a string, not a Blob.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.write(msg).await
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn recv(&self) -> Result<Option<Incoming>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Incoming::Data(data.into())));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Incoming::Data(text.as_bytes().to_vec())));
                }
                // tungstenite answers pings on its own.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Some(Incoming::Heartbeat));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
