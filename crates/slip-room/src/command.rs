//! Command dispatch: one client request in, a list of effects out.
//!
//! [`RoomRegistry::apply`] is where every room operation meets the
//! outside world. It never touches a socket; it returns [`Effect`]s that
//! the gateway executes in order. A failed request yields exactly one
//! effect, the `room:error` unicast to the requester, and leaves the
//! registry untouched.

use std::time::Instant;

use slip_protocol::{ClientEvent, PlayerId, ServerEvent};

use crate::{RoomCode, RoomError, RoomRegistry};

/// A request from one player, ready to apply to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateRoom { player: PlayerId, name: String },
    JoinRoom { player: PlayerId, code: String, name: String },
    SetReady { player: PlayerId, code: String, ready: bool },
    StartRoom { player: PlayerId, code: String },
    LeaveRoom { player: PlayerId, code: String },
    /// The player's connection is gone.
    Disconnect { player: PlayerId },
}

impl Command {
    /// Wraps a decoded client event.
    pub fn from_event(player: PlayerId, event: ClientEvent) -> Self {
        match event {
            ClientEvent::Create { name } => Self::CreateRoom { player, name },
            ClientEvent::Join { code, name } => Self::JoinRoom { player, code, name },
            ClientEvent::SetReady { code, ready } => Self::SetReady { player, code, ready },
            ClientEvent::Start { code } => Self::StartRoom { player, code },
            ClientEvent::Leave { code } => Self::LeaveRoom { player, code },
        }
    }

    pub fn player(&self) -> PlayerId {
        match self {
            Self::CreateRoom { player, .. }
            | Self::JoinRoom { player, .. }
            | Self::SetReady { player, .. }
            | Self::StartRoom { player, .. }
            | Self::LeaveRoom { player, .. }
            | Self::Disconnect { player } => *player,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create",
            Self::JoinRoom { .. } => "join",
            Self::SetReady { .. } => "set_ready",
            Self::StartRoom { .. } => "start",
            Self::LeaveRoom { .. } => "leave",
            Self::Disconnect { .. } => "disconnect",
        }
    }
}

/// Who an outbound event goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every player subscribed to the room's channel.
    Room(RoomCode),
    /// One player.
    Player(PlayerId),
}

/// Something the gateway must do after a command was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add the player to the room's broadcast channel.
    Subscribe { player: PlayerId, code: RoomCode },
    /// Remove the player from the room's broadcast channel.
    Unsubscribe { player: PlayerId, code: RoomCode },
    Send { to: Recipient, event: ServerEvent },
}

impl Effect {
    fn broadcast(code: &RoomCode, event: ServerEvent) -> Self {
        Self::Send {
            to: Recipient::Room(code.clone()),
            event,
        }
    }
}

impl RoomRegistry {
    /// Applies one command and returns the effects to carry out, in order.
    pub fn apply(&mut self, command: Command, now: Instant) -> Vec<Effect> {
        let player = command.player();
        let kind = command.name();
        let mut effects = Vec::new();

        let result = match command {
            Command::CreateRoom { player, name } => {
                self.apply_create(player, &name, now, &mut effects)
            }
            Command::JoinRoom { player, code, name } => {
                self.apply_join(player, &code, &name, now, &mut effects)
            }
            Command::SetReady { player, code, ready } => {
                self.apply_set_ready(player, &code, ready, now, &mut effects)
            }
            Command::StartRoom { player, code } => {
                self.apply_start(player, &code, now, &mut effects)
            }
            Command::LeaveRoom { player, code } => {
                self.apply_leave(player, &code, now, &mut effects)
            }
            Command::Disconnect { player } => self.apply_disconnect(player, now, &mut effects),
        };

        if let Err(err) = result {
            if err.is_expected() {
                tracing::debug!(%player, command = kind, error = %err, "room command rejected");
            } else {
                tracing::error!(%player, command = kind, error = %err, "room command failed");
            }
            effects.push(Effect::Send {
                to: Recipient::Player(player),
                event: ServerEvent::Error {
                    message: err.client_message().to_string(),
                },
            });
        }
        effects
    }

    fn apply_create(
        &mut self,
        player: PlayerId,
        name: &str,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let previous = self.room_of(player).cloned();
        let code = self.create_room(now).code().clone();
        tracing::info!(room = %code, %player, "room created");

        if let Err(err) = self.add_player(&code, player, name, now) {
            self.delete_room(&code);
            return Err(RoomError::Internal(format!(
                "new room {code} rejected its creator: {err}"
            )));
        }
        if let Some(previous) = previous {
            self.depart(player, &previous, now, effects)?;
        }
        self.subscribe_and_broadcast(player, &code, effects)
    }

    fn apply_join(
        &mut self,
        player: PlayerId,
        raw_code: &str,
        name: &str,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let code = self.get_room(raw_code)?.code().clone();
        let previous = self.room_of(player).filter(|c| **c != code).cloned();

        self.add_player(&code, player, name, now)?;
        if let Some(previous) = previous {
            self.depart(player, &previous, now, effects)?;
        }
        self.subscribe_and_broadcast(player, &code, effects)
    }

    fn apply_set_ready(
        &mut self,
        player: PlayerId,
        raw_code: &str,
        ready: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let room = self.get_room_mut(raw_code)?;
        room.set_ready(player, ready, now)?;
        tracing::debug!(room = %room.code(), %player, ready, "readiness changed");
        effects.push(Effect::broadcast(room.code(), ServerEvent::State(room.snapshot())));
        Ok(())
    }

    fn apply_start(
        &mut self,
        player: PlayerId,
        raw_code: &str,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let room = self.get_room_mut(raw_code)?;
        room.start(player, now)?;
        let code = room.code().clone();
        tracing::info!(room = %code, players = room.players().len(), "room started");

        effects.push(Effect::broadcast(&code, ServerEvent::State(room.snapshot())));
        effects.push(Effect::broadcast(
            &code,
            ServerEvent::Started {
                code: code.to_string(),
            },
        ));
        Ok(())
    }

    fn apply_leave(
        &mut self,
        player: PlayerId,
        raw_code: &str,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let room = self.get_room(raw_code)?;
        if !room.contains(player) {
            return Err(RoomError::PlayerNotFound(player, room.code().clone()));
        }
        let code = room.code().clone();
        self.depart(player, &code, now, effects)
    }

    fn apply_disconnect(
        &mut self,
        player: PlayerId,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let Some(code) = self.room_of(player).cloned() else {
            return Ok(());
        };
        self.depart(player, &code, now, effects)
    }

    /// Takes `player` out of `code`, unsubscribes them, and tells whoever
    /// is left. An emptied room is deleted without a broadcast.
    fn depart(
        &mut self,
        player: PlayerId,
        code: &RoomCode,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let departure = self.remove_player(code, player, now).map_err(|err| {
            RoomError::Internal(format!("membership of {player} in {code} is stale: {err}"))
        })?;

        effects.push(Effect::Unsubscribe {
            player,
            code: code.clone(),
        });
        if !departure.room_empty {
            let room = self.get_room(code.as_str())?;
            effects.push(Effect::broadcast(code, ServerEvent::State(room.snapshot())));
        }
        Ok(())
    }

    fn subscribe_and_broadcast(
        &self,
        player: PlayerId,
        code: &RoomCode,
        effects: &mut Vec<Effect>,
    ) -> Result<(), RoomError> {
        let room = self.get_room(code.as_str())?;
        effects.push(Effect::Subscribe {
            player,
            code: code.clone(),
        });
        effects.push(Effect::broadcast(code, ServerEvent::State(room.snapshot())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomConfig;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn registry() -> RoomRegistry {
        RoomRegistry::with_seed(RoomConfig::default(), 9)
    }

    fn create(reg: &mut RoomRegistry, player: u64, name: &str) -> RoomCode {
        let effects = reg.apply(
            Command::CreateRoom {
                player: pid(player),
                name: name.into(),
            },
            Instant::now(),
        );
        match effects.as_slice() {
            [Effect::Subscribe { code, .. }, ..] => code.clone(),
            other => panic!("expected subscribe, got {other:?}"),
        }
    }

    fn join(reg: &mut RoomRegistry, player: u64, code: &str) -> Vec<Effect> {
        reg.apply(
            Command::JoinRoom {
                player: pid(player),
                code: code.into(),
                name: format!("p{player}"),
            },
            Instant::now(),
        )
    }

    fn error_to(effects: &[Effect], player: u64) -> Option<&str> {
        match effects {
            [
                Effect::Send {
                    to: Recipient::Player(p),
                    event: ServerEvent::Error { message },
                },
            ] if *p == pid(player) => Some(message.as_str()),
            _ => None,
        }
    }

    // =========================================================================
    // Create / join
    // =========================================================================

    #[test]
    fn test_create_subscribes_and_broadcasts_state() {
        let mut reg = registry();
        let effects = reg.apply(
            Command::CreateRoom {
                player: pid(1),
                name: "Ana".into(),
            },
            Instant::now(),
        );
        assert_eq!(effects.len(), 2);
        let Effect::Subscribe { player, code } = &effects[0] else {
            panic!("expected subscribe first: {effects:?}");
        };
        assert_eq!(*player, pid(1));
        let Effect::Send {
            to: Recipient::Room(to),
            event: ServerEvent::State(snapshot),
        } = &effects[1]
        else {
            panic!("expected state broadcast: {effects:?}");
        };
        assert_eq!(to, code);
        assert_eq!(snapshot.code, code.as_str());
        assert_eq!(snapshot.players.len(), 1);
        assert!(snapshot.players[0].is_host);
        assert_eq!(snapshot.players[0].name, "Ana");
        assert!(!snapshot.started);
    }

    #[test]
    fn test_join_lowercase_code() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        let effects = join(&mut reg, 2, &code.as_str().to_lowercase());
        assert!(matches!(&effects[0], Effect::Subscribe { player, .. } if *player == pid(2)));
        assert_eq!(reg.get_room(code.as_str()).unwrap().players().len(), 2);
    }

    #[test]
    fn test_join_unknown_room_unicasts_error() {
        let mut reg = registry();
        let effects = join(&mut reg, 1, "ZZZZZ");
        assert_eq!(error_to(&effects, 1), Some("Room not found"));
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        join(&mut reg, 2, code.as_str());
        let effects = join(&mut reg, 2, code.as_str());
        assert_eq!(error_to(&effects, 2), Some("You are already in this room"));
        assert_eq!(reg.get_room(code.as_str()).unwrap().players().len(), 2);
    }

    #[test]
    fn test_join_full_room() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        for p in 2..=6 {
            join(&mut reg, p, code.as_str());
        }
        let effects = join(&mut reg, 7, code.as_str());
        assert_eq!(error_to(&effects, 7), Some("Room is full"));
    }

    #[test]
    fn test_join_other_room_leaves_previous() {
        let mut reg = registry();
        let first = create(&mut reg, 1, "a");
        join(&mut reg, 2, first.as_str());
        let second = create(&mut reg, 3, "c");

        let effects = join(&mut reg, 2, second.as_str());

        assert_eq!(reg.room_of(pid(2)), Some(&second));
        assert!(!reg.get_room(first.as_str()).unwrap().contains(pid(2)));
        assert!(effects.contains(&Effect::Unsubscribe {
            player: pid(2),
            code: first.clone(),
        }));
        assert!(effects.contains(&Effect::Subscribe {
            player: pid(2),
            code: second.clone(),
        }));
    }

    #[test]
    fn test_failed_join_keeps_previous_room() {
        let mut reg = registry();
        let first = create(&mut reg, 1, "a");
        join(&mut reg, 2, first.as_str());

        let effects = join(&mut reg, 2, "ZZZZZ");

        assert!(error_to(&effects, 2).is_some());
        assert_eq!(reg.room_of(pid(2)), Some(&first));
    }

    #[test]
    fn test_create_while_in_room_moves_creator() {
        let mut reg = registry();
        let first = create(&mut reg, 1, "a");
        let second = create(&mut reg, 1, "a");
        assert_ne!(first, second);
        assert!(reg.get_room(first.as_str()).is_err(), "emptied room is deleted");
        assert_eq!(reg.room_of(pid(1)), Some(&second));
    }

    // =========================================================================
    // Ready / start
    // =========================================================================

    #[test]
    fn test_start_emits_state_then_started() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        join(&mut reg, 2, code.as_str());
        for p in [1, 2] {
            reg.apply(
                Command::SetReady {
                    player: pid(p),
                    code: code.to_string(),
                    ready: true,
                },
                Instant::now(),
            );
        }

        let effects = reg.apply(
            Command::StartRoom {
                player: pid(1),
                code: code.to_string(),
            },
            Instant::now(),
        );
        assert_eq!(effects.len(), 2);
        assert!(matches!(
            &effects[0],
            Effect::Send { event: ServerEvent::State(s), .. } if s.started
        ));
        assert_eq!(
            effects[1],
            Effect::Send {
                to: Recipient::Room(code.clone()),
                event: ServerEvent::Started {
                    code: code.to_string()
                },
            }
        );

        let again = reg.apply(
            Command::StartRoom {
                player: pid(1),
                code: code.to_string(),
            },
            Instant::now(),
        );
        assert_eq!(error_to(&again, 1), Some("Game has already been started"));
    }

    #[test]
    fn test_start_by_guest_rejected() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        join(&mut reg, 2, code.as_str());
        let effects = reg.apply(
            Command::StartRoom {
                player: pid(2),
                code: code.to_string(),
            },
            Instant::now(),
        );
        assert_eq!(error_to(&effects, 2), Some("Only the host can start the game"));
    }

    #[test]
    fn test_set_ready_by_non_member_rejected() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        let effects = reg.apply(
            Command::SetReady {
                player: pid(9),
                code: code.to_string(),
                ready: true,
            },
            Instant::now(),
        );
        assert_eq!(error_to(&effects, 9), Some("You are not in this room"));
    }

    // =========================================================================
    // Leave / disconnect
    // =========================================================================

    #[test]
    fn test_leave_reassigns_host_and_broadcasts() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        join(&mut reg, 2, code.as_str());

        let effects = reg.apply(
            Command::LeaveRoom {
                player: pid(1),
                code: code.to_string(),
            },
            Instant::now(),
        );
        assert_eq!(
            effects[0],
            Effect::Unsubscribe {
                player: pid(1),
                code: code.clone()
            }
        );
        let Effect::Send {
            event: ServerEvent::State(snapshot),
            ..
        } = &effects[1]
        else {
            panic!("expected state broadcast: {effects:?}");
        };
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].id, pid(2));
        assert!(snapshot.players[0].is_host);
        assert!(reg.room_of(pid(1)).is_none());
    }

    #[test]
    fn test_leave_room_not_joined() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        let effects = reg.apply(
            Command::LeaveRoom {
                player: pid(2),
                code: code.to_string(),
            },
            Instant::now(),
        );
        assert_eq!(error_to(&effects, 2), Some("You are not in this room"));
    }

    #[test]
    fn test_disconnect_last_player_deletes_room_silently() {
        let mut reg = registry();
        let code = create(&mut reg, 1, "a");
        let effects = reg.apply(Command::Disconnect { player: pid(1) }, Instant::now());
        assert_eq!(
            effects,
            vec![Effect::Unsubscribe {
                player: pid(1),
                code: code.clone()
            }]
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_disconnect_without_room_is_noop() {
        let mut reg = registry();
        let effects = reg.apply(Command::Disconnect { player: pid(4) }, Instant::now());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_command_from_event() {
        let cmd = Command::from_event(
            pid(3),
            ClientEvent::Join {
                code: "abcde".into(),
                name: "x".into(),
            },
        );
        assert_eq!(
            cmd,
            Command::JoinRoom {
                player: pid(3),
                code: "abcde".into(),
                name: "x".into()
            }
        );
        assert_eq!(cmd.player(), pid(3));
    }
}
