//! Room limits and the lobby → active phase machine.

use std::time::Duration;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Limits and timings shared by every room in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Minimum players required to start.
    pub min_players: usize,

    /// Maximum players allowed in one room.
    pub max_players: usize,

    /// Idle time after which the sweep deletes a room. Measured from the
    /// room's last mutation.
    pub ttl: Duration,

    /// How often the gateway runs the expiry sweep.
    pub sweep_interval: Duration,
}

impl RoomConfig {
    pub const DEFAULT_MIN_PLAYERS: usize = 2;
    pub const DEFAULT_MAX_PLAYERS: usize = 6;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: Self::DEFAULT_MIN_PLAYERS,
            max_players: Self::DEFAULT_MAX_PLAYERS,
            ttl: Self::DEFAULT_TTL,
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// Lobby ──(host starts, everyone ready)──→ Active
/// ```
///
/// There is no way back: an active room stays active until it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    /// Accepting joins and readiness changes.
    #[default]
    Lobby,
    /// The host has started the session.
    Active,
}

impl RoomPhase {
    /// Returns `true` if new players may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` once the room has started.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Active)
    }

    /// The only phase reachable from this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Lobby => Some(Self::Active),
            Self::Active => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Active => write!(f, "active"),
        }
    }
}
