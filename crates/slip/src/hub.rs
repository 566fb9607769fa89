//! The hub: a single task that owns every room and every outbound channel.
//!
//! Connection handlers never touch the registry. They post
//! [`HubCommand`]s on one bounded queue; the hub applies each command to
//! the [`RoomRegistry`] and carries out the resulting [`Effect`]s before
//! looking at the next one. Because of that, all clients in a room see
//! state snapshots in the same order they were produced.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use slip_protocol::{ClientEvent, PlayerId, ServerEvent};
use slip_room::{Command, Effect, Recipient, RoomCode, RoomConfig, RoomRegistry};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;

use crate::SlipError;

/// Outbound event queue for one connection, drained by its writer task.
///
/// The queue is bounded. A client that falls a full queue behind is
/// disconnected rather than buffered without limit.
pub(crate) type ClientSender = mpsc::Sender<ServerEvent>;

/// Work posted to the hub by connection handlers.
#[derive(Debug)]
pub(crate) enum HubCommand {
    /// A connection was accepted. The hub acknowledges it on `sender`.
    Connect {
        player: PlayerId,
        sender: ClientSender,
    },

    /// A decoded client event.
    Event { player: PlayerId, event: ClientEvent },

    /// Queue `event` for `player` alone, outside any room.
    Notify { player: PlayerId, event: ServerEvent },

    /// The connection is gone; leave whatever room it was in.
    Disconnect { player: PlayerId },
}

/// Cheap, cloneable handle for posting commands to the hub.
#[derive(Clone)]
pub(crate) struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub(crate) async fn connect(
        &self,
        player: PlayerId,
        sender: ClientSender,
    ) -> Result<(), SlipError> {
        self.post(HubCommand::Connect { player, sender }).await
    }

    pub(crate) async fn event(&self, player: PlayerId, event: ClientEvent) -> Result<(), SlipError> {
        self.post(HubCommand::Event { player, event }).await
    }

    pub(crate) async fn notify(&self, player: PlayerId, event: ServerEvent) -> Result<(), SlipError> {
        self.post(HubCommand::Notify { player, event }).await
    }

    pub(crate) async fn disconnect(&self, player: PlayerId) -> Result<(), SlipError> {
        self.post(HubCommand::Disconnect { player }).await
    }

    async fn post(&self, command: HubCommand) -> Result<(), SlipError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SlipError::HubUnavailable)
    }
}

struct Hub {
    registry: RoomRegistry,
    /// Outbound queue per connected player.
    clients: HashMap<PlayerId, ClientSender>,
    /// Broadcast membership per room.
    channels: HashMap<RoomCode, HashSet<PlayerId>>,
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Runs until every [`HubHandle`] has been dropped.
    async fn run(mut self, sweep_every: Duration) {
        tracing::info!(every = ?sweep_every, "room hub started");

        let mut sweep = tokio::time::interval(sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        sweep.tick().await;

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }

        tracing::info!("room hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { player, sender } => {
                tracing::debug!(%player, "client registered");
                self.clients.insert(player, sender);
                if !self.deliver(player, ServerEvent::ConnectionAck { id: player }) {
                    self.evict(player);
                }
            }
            HubCommand::Event { player, event } => {
                let effects = self.registry.apply(Command::from_event(player, event), now());
                self.dispatch(effects);
            }
            HubCommand::Notify { player, event } => {
                if !self.deliver(player, event) {
                    self.evict(player);
                }
            }
            HubCommand::Disconnect { player } => {
                tracing::debug!(%player, "client unregistered");
                self.clients.remove(&player);
                let effects = self.registry.apply(Command::Disconnect { player }, now());
                self.dispatch(effects);
            }
        }
    }

    fn dispatch(&mut self, effects: Vec<Effect>) {
        let mut lagging = Vec::new();
        for effect in effects {
            match effect {
                Effect::Subscribe { player, code } => {
                    self.channels.entry(code).or_default().insert(player);
                }
                Effect::Unsubscribe { player, code } => {
                    if let Entry::Occupied(mut members) = self.channels.entry(code) {
                        members.get_mut().remove(&player);
                        if members.get().is_empty() {
                            members.remove();
                        }
                    }
                }
                Effect::Send {
                    to: Recipient::Room(code),
                    event,
                } => {
                    for player in self.channels.get(&code).into_iter().flatten() {
                        if !self.deliver(*player, event.clone()) {
                            lagging.push(*player);
                        }
                    }
                }
                Effect::Send {
                    to: Recipient::Player(player),
                    event,
                } => {
                    if !self.deliver(player, event) {
                        lagging.push(player);
                    }
                }
            }
        }

        // Evictions broadcast snapshots of their own, so they run after the batch.
        for player in lagging {
            self.evict(player);
        }
    }

    /// Queues `event` for `player`. Returns `false` only when the client's
    /// queue is full.
    fn deliver(&self, player: PlayerId, event: ServerEvent) -> bool {
        let Some(sender) = self.clients.get(&player) else {
            tracing::debug!(%player, "dropping event for unknown connection");
            return true;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%player, "dropping event for closed connection");
                true
            }
            Err(TrySendError::Full(_)) => false,
        }
    }

    /// Drops a client that cannot keep up. Closing its queue stops the
    /// writer, which closes the socket.
    fn evict(&mut self, player: PlayerId) {
        if self.clients.contains_key(&player) {
            tracing::warn!(%player, "outbound queue full, disconnecting slow client");
            self.handle(HubCommand::Disconnect { player });
        }
    }

    fn sweep(&mut self) {
        let expired = self.registry.sweep_expired(now());
        for room in &expired {
            self.channels.remove(&room.code);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), live = self.registry.len(), "expired rooms swept");
        }
    }
}

/// Spawns the hub task and returns a handle to it.
///
/// `queue_size` bounds the inbound command queue; handlers wait when it
/// is full.
pub(crate) fn spawn_hub(registry: RoomRegistry, queue_size: usize) -> HubHandle {
    let (sender, receiver) = mpsc::channel(queue_size);

    let sweep_every = match registry.config().sweep_interval {
        d if d.is_zero() => RoomConfig::DEFAULT_SWEEP_INTERVAL,
        d => d,
    };
    let hub = Hub {
        registry,
        clients: HashMap::new(),
        channels: HashMap::new(),
        receiver,
    };
    tokio::spawn(hub.run(sweep_every));

    HubHandle { sender }
}

/// Wall-clock reading that follows tokio's clock, so paused-time tests
/// can drive room expiry.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    async fn connect(hub: &HubHandle, id: u64) -> mpsc::Receiver<ServerEvent> {
        connect_with_capacity(hub, id, 64).await
    }

    async fn connect_with_capacity(
        hub: &HubHandle,
        id: u64,
        capacity: usize,
    ) -> mpsc::Receiver<ServerEvent> {
        let (tx, mut rx) = mpsc::channel(capacity);
        hub.connect(pid(id), tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(ServerEvent::ConnectionAck { id: pid(id) }));
        rx
    }

    async fn next_state(rx: &mut mpsc::Receiver<ServerEvent>) -> slip_protocol::RoomSnapshot {
        match rx.recv().await {
            Some(ServerEvent::State(snapshot)) => snapshot,
            other => panic!("expected room:state, got {other:?}"),
        }
    }

    fn hub_with(config: RoomConfig) -> HubHandle {
        spawn_hub(RoomRegistry::with_seed(config, 77), 64)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[tokio::test]
    async fn test_create_and_join_broadcast_to_room() {
        let hub = hub_with(RoomConfig::default());
        let mut host = connect(&hub, 1).await;
        let mut guest = connect(&hub, 2).await;

        hub.event(pid(1), ClientEvent::Create { name: "Ana".into() })
            .await
            .unwrap();
        let created = next_state(&mut host).await;
        assert_eq!(created.players.len(), 1);

        hub.event(
            pid(2),
            ClientEvent::Join {
                code: created.code.to_lowercase(),
                name: "Ben".into(),
            },
        )
        .await
        .unwrap();

        let seen_by_host = next_state(&mut host).await;
        let seen_by_guest = next_state(&mut guest).await;
        assert_eq!(seen_by_host, seen_by_guest);
        assert_eq!(seen_by_guest.players.len(), 2);
        assert!(seen_by_guest.players[0].is_host);
    }

    #[tokio::test]
    async fn test_errors_are_unicast() {
        let hub = hub_with(RoomConfig::default());
        let mut host = connect(&hub, 1).await;
        let mut guest = connect(&hub, 2).await;

        hub.event(pid(1), ClientEvent::Create { name: String::new() })
            .await
            .unwrap();
        let code = next_state(&mut host).await.code;
        hub.event(pid(2), ClientEvent::Join { code: code.clone(), name: String::new() })
            .await
            .unwrap();
        next_state(&mut host).await;
        next_state(&mut guest).await;

        hub.event(pid(2), ClientEvent::Start { code }).await.unwrap();
        assert_eq!(
            guest.recv().await,
            Some(ServerEvent::Error {
                message: "Only the host can start the game".into()
            })
        );
        assert!(host.try_recv().is_err(), "host must not see the guest's error");
    }

    #[tokio::test]
    async fn test_disconnect_updates_remaining_players() {
        let hub = hub_with(RoomConfig::default());
        let mut host = connect(&hub, 1).await;
        let mut guest = connect(&hub, 2).await;

        hub.event(pid(1), ClientEvent::Create { name: "a".into() })
            .await
            .unwrap();
        let code = next_state(&mut host).await.code;
        hub.event(pid(2), ClientEvent::Join { code, name: "b".into() })
            .await
            .unwrap();
        next_state(&mut host).await;
        next_state(&mut guest).await;

        hub.disconnect(pid(1)).await.unwrap();

        let after = next_state(&mut guest).await;
        assert_eq!(after.players.len(), 1);
        assert_eq!(after.players[0].id, pid(2));
        assert!(after.players[0].is_host);
    }

    #[tokio::test]
    async fn test_notify_reaches_only_that_player() {
        let hub = hub_with(RoomConfig::default());
        let mut first = connect(&hub, 1).await;
        let mut second = connect(&hub, 2).await;

        let event = ServerEvent::Error {
            message: "Invalid message".into(),
        };
        hub.notify(pid(1), event.clone()).await.unwrap();

        assert_eq!(first.recv().await, Some(event));
        assert!(second.try_recv().is_err());
    }

    // =========================================================================
    // Backpressure
    // =========================================================================

    #[tokio::test]
    async fn test_full_client_queue_disconnects_that_client() {
        let hub = hub_with(RoomConfig::default());
        // Room for two events after the ack, and this client never drains.
        let mut slow = connect_with_capacity(&hub, 1, 2).await;
        let mut guest = connect(&hub, 2).await;

        hub.event(pid(1), ClientEvent::Create { name: "slow".into() })
            .await
            .unwrap();
        // Take the one snapshot so the queue is empty again.
        let code = next_state(&mut slow).await.code;
        hub.event(pid(2), ClientEvent::Join { code: code.clone(), name: "g".into() })
            .await
            .unwrap();
        assert_eq!(next_state(&mut guest).await.players.len(), 2);

        hub.event(pid(2), ClientEvent::SetReady { code: code.clone(), ready: true })
            .await
            .unwrap();
        hub.event(pid(2), ClientEvent::SetReady { code, ready: false })
            .await
            .unwrap();

        // Two snapshots fill the slow queue; the third evicts its owner.
        let mut last = next_state(&mut guest).await;
        while last.players.len() != 1 {
            last = next_state(&mut guest).await;
        }
        assert_eq!(last.players[0].id, pid(2));
        assert!(last.players[0].is_host);

        // The slow client gets what was already queued, then the queue ends.
        assert!(matches!(slow.recv().await, Some(ServerEvent::State(_))));
        assert!(matches!(slow.recv().await, Some(ServerEvent::State(_))));
        assert_eq!(slow.recv().await, None);
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expires_idle_room() {
        let hub = hub_with(RoomConfig {
            ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            ..RoomConfig::default()
        });
        let mut host = connect(&hub, 1).await;
        let mut late = connect(&hub, 2).await;

        hub.event(pid(1), ClientEvent::Create { name: "a".into() })
            .await
            .unwrap();
        let code = next_state(&mut host).await.code;

        tokio::time::sleep(Duration::from_secs(12)).await;

        hub.event(pid(2), ClientEvent::Join { code, name: "b".into() })
            .await
            .unwrap();
        assert_eq!(
            late.recv().await,
            Some(ServerEvent::Error {
                message: "Room not found".into()
            })
        );
        assert!(host.try_recv().is_err(), "expiry is silent");
    }
}
