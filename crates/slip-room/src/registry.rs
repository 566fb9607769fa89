//! The room registry: the single owner of every live room.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use slip_protocol::PlayerId;

use crate::room::Departure;
use crate::{Room, RoomCode, RoomConfig, RoomError, code};

/// A room removed by the expiry sweep, with the players it still held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredRoom {
    pub code: RoomCode,
    pub players: Vec<PlayerId>,
}

/// In-memory store of live rooms, keyed by code.
///
/// The registry is an ordinary owned value: whoever holds it (the
/// gateway's hub task, or a test) is the only thing that can mutate
/// rooms. It also tracks which room each player is in; a player sits in
/// at most one room at a time.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    player_rooms: HashMap<PlayerId, RoomCode>,
    config: RoomConfig,
    rng: StdRng,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates an empty registry whose room codes come from a seeded
    /// generator, for reproducible tests.
    pub fn with_seed(config: RoomConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: RoomConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates an empty lobby under a fresh code.
    pub fn create_room(&mut self, now: Instant) -> &mut Room {
        let rooms = &self.rooms;
        let code = code::generate_unique(&mut self.rng, |c| rooms.contains_key(c));
        let room = Room::new(code.clone(), &self.config, unix_millis(), now);
        self.rooms.entry(code).or_insert(room)
    }

    /// Looks a room up by a client-supplied code (case-insensitive).
    pub fn get_room(&self, raw_code: &str) -> Result<&Room, RoomError> {
        let code = parse_code(raw_code)?;
        self.rooms
            .get(&code)
            .ok_or(RoomError::RoomNotFound(code.to_string()))
    }

    /// Mutable lookup by a client-supplied code (case-insensitive).
    pub fn get_room_mut(&mut self, raw_code: &str) -> Result<&mut Room, RoomError> {
        let code = parse_code(raw_code)?;
        self.rooms
            .get_mut(&code)
            .ok_or(RoomError::RoomNotFound(code.to_string()))
    }

    /// Removes a room and forgets its players' membership. Idempotent.
    pub fn delete_room(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code)?;
        self.player_rooms.retain(|_, c| c != code);
        tracing::info!(room = %code, "room deleted");
        Some(room)
    }

    /// Seats `player` in the room `code` and records the membership.
    ///
    /// If the player was indexed under another room, the index now points
    /// here; the caller is responsible for leaving the old room.
    pub fn add_player(
        &mut self,
        code: &RoomCode,
        player: PlayerId,
        name: &str,
        now: Instant,
    ) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;
        room.add_player(player, name, now)?;
        self.player_rooms.insert(player, code.clone());
        tracing::info!(room = %code, %player, players = room.players().len(), "player joined");
        Ok(room)
    }

    /// Removes `player` from the room `code`, deleting the room if that
    /// emptied it.
    pub fn remove_player(
        &mut self,
        code: &RoomCode,
        player: PlayerId,
        now: Instant,
    ) -> Result<Departure, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;
        let departure = room
            .remove_player(player, now)
            .ok_or_else(|| RoomError::PlayerNotFound(player, code.clone()))?;

        if self.player_rooms.get(&player) == Some(code) {
            self.player_rooms.remove(&player);
        }
        tracing::info!(room = %code, %player, "player left");
        if let Some(host) = departure.new_host {
            tracing::info!(room = %code, %host, "host reassigned");
        }
        if departure.room_empty {
            self.delete_room(code);
        }
        Ok(departure)
    }

    /// The room `player` is currently in, if any.
    pub fn room_of(&self, player: PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(&player)
    }

    /// Deletes every room idle past the TTL as of `now`, or already empty.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<ExpiredRoom> {
        let ttl = self.config.ttl;
        let doomed: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| room.is_empty() || room.is_expired(now, ttl))
            .map(|room| room.code().clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|code| {
                let room = self.delete_room(&code)?;
                tracing::info!(room = %code, players = room.players().len(), "room expired");
                Some(ExpiredRoom {
                    code,
                    players: room.players().iter().map(|p| p.id).collect(),
                })
            })
            .collect()
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

/// Normalizes a client-supplied code; unparseable codes are "not found".
fn parse_code(raw: &str) -> Result<RoomCode, RoomError> {
    RoomCode::parse(raw).ok_or_else(|| RoomError::RoomNotFound(raw.trim().to_string()))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
