//! `SlipServer` builder and accept loop.
//!
//! This is the entry point for running a Slip room server. It ties the
//! layers together: transport → handler → hub → room registry.

use std::time::Duration;

use slip_protocol::{Codec, JsonCodec};
use slip_room::{RoomConfig, RoomRegistry};
use slip_transport::{Transport, TransportError, WebSocketTransport};

use crate::SlipError;
use crate::handler::{ConnectionLimits, handle_connection};
use crate::hub::{HubHandle, spawn_hub};

/// Connections with no inbound frame, pongs included, are closed after
/// this long.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How often the server pings each client. Well under the idle timeout,
/// so a client that answers pings is never idle.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Capacity of each client's outbound event queue.
pub const DEFAULT_CLIENT_QUEUE_SIZE: usize = 256;

/// Capacity of the hub's inbound command queue.
pub const DEFAULT_HUB_QUEUE_SIZE: usize = 1024;

/// Builder for configuring and starting a Slip server.
///
/// # Example
///
/// ```rust,no_run
/// use slip::prelude::*;
///
/// # async fn start() -> Result<(), SlipError> {
/// let server = SlipServer::builder()
///     .bind("0.0.0.0:5001")
///     .room_config(RoomConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct SlipServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Option<Duration>,
    keepalive_interval: Option<Duration>,
    hub_queue_size: usize,
    client_queue_size: usize,
}

impl SlipServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5001".to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            hub_queue_size: DEFAULT_HUB_QUEUE_SIZE,
            client_queue_size: DEFAULT_CLIENT_QUEUE_SIZE,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets room limits and expiry timings.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a connection may go without sending any frame.
    /// Answering the server's pings counts. `None` disables the timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how often clients are pinged. `None` disables pings, in which
    /// case a client must send frames of its own to stay connected.
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn hub_queue_size(mut self, size: usize) -> Self {
        self.hub_queue_size = size.max(1);
        self
    }

    /// Sets how many events may wait for one client before it is
    /// disconnected as too slow.
    pub fn client_queue_size(mut self, size: usize) -> Self {
        self.client_queue_size = size.max(1);
        self
    }

    /// Binds the listener and starts the room hub.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<SlipServer, SlipError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        tracing::info!(
            addr = %self.bind_addr,
            max_players = self.room_config.max_players,
            ttl = ?self.room_config.ttl,
            idle_timeout = ?self.idle_timeout,
            keepalive = ?self.keepalive_interval,
            "server bound"
        );
        let hub = spawn_hub(RoomRegistry::new(self.room_config), self.hub_queue_size);

        Ok(SlipServer {
            transport,
            hub,
            codec: JsonCodec,
            limits: ConnectionLimits {
                idle_timeout: self.idle_timeout,
                keepalive: self.keepalive_interval,
                queue_size: self.client_queue_size,
            },
        })
    }
}

impl Default for SlipServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Slip server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SlipServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    hub: HubHandle,
    codec: C,
    limits: ConnectionLimits,
}

impl SlipServer {
    /// Creates a new builder.
    pub fn builder() -> SlipServerBuilder {
        SlipServerBuilder::new()
    }
}

impl<C: Codec + Clone> SlipServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated or the transport shuts down.
    pub async fn run(mut self) -> Result<(), SlipError> {
        tracing::info!("slip server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let hub = self.hub.clone();
                    let codec = self.codec.clone();
                    let limits = self.limits;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, hub, codec, limits).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => {
                    tracing::info!("transport shut down, server stopping");
                    return Err(TransportError::Shutdown.into());
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
