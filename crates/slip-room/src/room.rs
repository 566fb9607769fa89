//! A single party room and the rules for changing it.
//!
//! Every mutating method either applies its change completely and
//! refreshes `updated_at`, or returns a [`RoomError`] and leaves the room
//! untouched.

use std::time::{Duration, Instant};

use slip_protocol::{PlayerId, PlayerSnapshot, RoomSnapshot};

use crate::{RoomCode, RoomConfig, RoomError, RoomPhase};

/// Display name given to players who leave theirs blank.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// One connection's seat in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
}

/// What happened when a player left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The player that was removed.
    pub player: Player,
    /// The player who inherited the host seat, if the host left and
    /// anyone remains.
    pub new_host: Option<PlayerId>,
    /// `true` if nobody is left; the registry deletes such rooms at once.
    pub room_empty: bool,
}

/// One party session.
///
/// # Host succession
///
/// `players` is kept in join order and the host is, by definition, the
/// first entry. The creator joins first and is host; when the host
/// leaves, the earliest-joined survivor moves to the front and becomes
/// host. Removing anyone else never changes the host. This makes "exactly
/// one host in a non-empty room" hold by construction.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    /// Unix epoch milliseconds, for clients.
    created_at: u64,
    updated_at: Instant,
    phase: RoomPhase,
    players: Vec<Player>,
    min_players: usize,
    max_players: usize,
}

impl Room {
    pub(crate) fn new(code: RoomCode, config: &RoomConfig, created_at: u64, now: Instant) -> Self {
        Self {
            code,
            created_at,
            updated_at: now,
            phase: RoomPhase::Lobby,
            players: Vec::with_capacity(config.max_players),
            min_players: config.min_players,
            max_players: config.max_players,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn updated_at(&self) -> Instant {
        self.updated_at
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase.is_started()
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The host: the earliest-joined player still present.
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host().is_some_and(|h| h.id == id)
    }

    /// `true` when there are enough players to start and all are ready.
    pub fn all_ready(&self) -> bool {
        self.players.len() >= self.min_players && self.players.iter().all(|p| p.ready)
    }

    /// `true` if the room has been idle for longer than `ttl` at `now`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.updated_at) > ttl
    }

    /// Seats a new, not-ready player at the end of the join order.
    pub fn add_player(&mut self, id: PlayerId, name: &str, now: Instant) -> Result<(), RoomError> {
        if self.contains(id) {
            return Err(RoomError::AlreadyJoined(id, self.code.clone()));
        }
        if !self.phase.is_joinable() {
            return Err(RoomError::GameAlreadyStarted(self.code.clone()));
        }
        if self.players.len() >= self.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        self.players.push(Player {
            id,
            name: normalize_name(name),
            ready: false,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Removes a player, passing the host seat on if needed.
    ///
    /// Returns `None` if the player was not in the room.
    pub fn remove_player(&mut self, id: PlayerId, now: Instant) -> Option<Departure> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);
        self.updated_at = now;

        let new_host = if index == 0 { self.host().map(|h| h.id) } else { None };
        Some(Departure {
            player,
            new_host,
            room_empty: self.players.is_empty(),
        })
    }

    /// Sets a player's readiness. Only allowed in the lobby.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool, now: Instant) -> Result<(), RoomError> {
        let code = &self.code;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RoomError::PlayerNotFound(id, code.clone()))?;
        if self.phase.is_started() {
            return Err(RoomError::GameAlreadyStarted(code.clone()));
        }

        player.ready = ready;
        self.updated_at = now;
        Ok(())
    }

    /// Moves the room from lobby to active on the host's request.
    pub fn start(&mut self, requester: PlayerId, now: Instant) -> Result<(), RoomError> {
        if !self.contains(requester) {
            return Err(RoomError::PlayerNotFound(requester, self.code.clone()));
        }
        if !self.phase.can_transition_to(RoomPhase::Active) {
            return Err(RoomError::AlreadyStarted(self.code.clone()));
        }
        if !self.is_host(requester) {
            return Err(RoomError::NotHost(requester, self.code.clone()));
        }
        if self.players.len() < self.min_players {
            return Err(RoomError::InsufficientPlayers {
                code: self.code.clone(),
                count: self.players.len(),
                min: self.min_players,
            });
        }
        if !self.all_ready() {
            return Err(RoomError::PlayersNotReady(self.code.clone()));
        }

        self.phase = RoomPhase::Active;
        self.updated_at = now;
        Ok(())
    }

    /// The full wire view of this room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.to_string(),
            created_at: self.created_at,
            started: self.phase.is_started(),
            players: self
                .players
                .iter()
                .enumerate()
                .map(|(i, p)| PlayerSnapshot {
                    id: p.id,
                    name: p.name.clone(),
                    ready: p.ready,
                    is_host: i == 0,
                })
                .collect(),
        }
    }
}

/// Trims a display name, substituting [`DEFAULT_PLAYER_NAME`] when blank.
fn normalize_name(raw: &str) -> String {
    match raw.trim() {
        "" => DEFAULT_PLAYER_NAME.to_string(),
        name => name.to_string(),
    }
}
