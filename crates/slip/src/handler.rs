//! Per-connection handler: register with the hub, pump frames both ways.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the hub, which queues `connection:ack`
//!   2. Spawn a writer task draining the outbound queue into the socket
//!      and pinging the client while it is quiet
//!   3. Loop: receive frames, decode, forward to the hub
//!   4. On exit, the drop guard tells the hub the player is gone
//!
//! The hub holds the only sender for the outbound queue. Once the hub
//! forgets a player the writer stops and closes the socket, which in turn
//! ends the read loop.

use std::sync::Arc;
use std::time::Duration;

use slip_protocol::{ClientEvent, Codec, PlayerId, ServerEvent};
use slip_transport::{Connection, Incoming, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::SlipError;
use crate::hub::HubHandle;

/// Text sent in `room:error` for frames that do not decode.
pub(crate) const INVALID_MESSAGE: &str = "Invalid message";

/// Per-connection timings and limits, fixed when the server is built.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    /// Close the connection after this long with no inbound frame.
    pub(crate) idle_timeout: Option<Duration>,
    /// Ping the client this often.
    pub(crate) keepalive: Option<Duration>,
    /// Capacity of the outbound event queue.
    pub(crate) queue_size: usize,
}

/// Drop guard that posts `Disconnect` when the handler exits.
///
/// This fires however the handler ends, including on error or panic.
/// `Drop` is synchronous, so the post is a fire-and-forget task.
struct DisconnectGuard {
    player: PlayerId,
    hub: HubHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let player = self.player;
        let hub = self.hub.clone();
        tokio::spawn(async move {
            if let Err(e) = hub.disconnect(player).await {
                tracing::debug!(%player, error = %e, "could not report disconnect");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    hub: HubHandle,
    codec: C,
    limits: ConnectionLimits,
) -> Result<(), SlipError>
where
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let player = PlayerId::from(conn.id());
    tracing::debug!(%player, "handling new connection");

    let (outbound, queue) = mpsc::channel(limits.queue_size.max(1));
    hub.connect(player, outbound).await?;
    let _guard = DisconnectGuard {
        player,
        hub: hub.clone(),
    };

    tokio::spawn(write_loop(
        Arc::clone(&conn),
        queue,
        codec.clone(),
        player,
        limits.keepalive,
    ));

    loop {
        // Any inbound frame, pongs included, restarts the idle clock.
        let received = match limits.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%player, "closing idle connection");
                    break;
                }
            },
            None => conn.recv().await,
        };

        let data = match received {
            Ok(Some(Incoming::Data(data))) => data,
            Ok(Some(Incoming::Heartbeat)) => {
                tracing::trace!(%player, "heartbeat");
                continue;
            }
            Ok(None) => {
                tracing::debug!(%player, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player, error = %e, "recv error");
                break;
            }
        };

        match codec.decode::<ClientEvent>(&data) {
            Ok(event) => {
                tracing::debug!(%player, ?event, "client event");
                hub.event(player, event).await?;
            }
            Err(e) => {
                tracing::warn!(%player, error = %e, "undecodable frame");
                let reply = ServerEvent::Error {
                    message: INVALID_MESSAGE.to_string(),
                };
                hub.notify(player, reply).await?;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%player, error = %e, "close failed");
    }
    // _guard drops here; the hub drops its sender and the writer exits.
    Ok(())
}

/// Drains one connection's outbound queue into its socket and pings the
/// client every `keepalive`.
///
/// Ends when the queue closes (the hub forgot the player) or the socket
/// stops accepting writes, and closes the socket on the way out.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut queue: mpsc::Receiver<ServerEvent>,
    codec: C,
    player: PlayerId,
    keepalive: Option<Duration>,
) {
    let mut heartbeat = keepalive.map(|every| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            event = queue.recv() => {
                let Some(event) = event else {
                    break;
                };
                let bytes = match codec.encode(&event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(%player, error = %e, "failed to encode server event");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%player, error = %e, "send failed, stopping writer");
                    break;
                }
            }
            () = next_tick(&mut heartbeat) => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%player, error = %e, "ping failed, stopping writer");
                    break;
                }
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::trace!(%player, error = %e, "writer close failed");
    }
}

/// Waits for the next keepalive tick, or forever when keepalive is off.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
