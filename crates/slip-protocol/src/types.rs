//! Wire types: event names and payload shapes are part of the client
//! contract and must not drift.

use std::fmt;

use serde::{Deserialize, Serialize};
use slip_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of one live connection's participation in the party game.
///
/// There is no persistent player identity: the id is the transport's
/// connection id, so a reconnecting browser is a new player.
/// Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<ConnectionId> for PlayerId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One player as seen in a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub is_host: bool,
}

/// The complete state of one room.
///
/// Always sent whole, never as a delta: each snapshot replaces the
/// previous one on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    /// Unix epoch milliseconds.
    pub created_at: u64,
    pub started: bool,
    /// In join order; the host is listed first.
    pub players: Vec<PlayerSnapshot>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events a client may send.
///
/// Codes arrive exactly as typed; normalization happens in the room layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "room:create")]
    Create {
        #[serde(default)]
        name: String,
    },

    #[serde(rename = "room:join")]
    Join {
        code: String,
        #[serde(default)]
        name: String,
    },

    #[serde(rename = "room:setReady")]
    SetReady { code: String, ready: bool },

    #[serde(rename = "room:start")]
    Start { code: String },

    /// Leave a room without closing the connection.
    #[serde(rename = "room:leave")]
    Leave { code: String },
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once per connection, right after the upgrade, so the client
    /// can recognize itself in snapshots.
    #[serde(rename = "connection:ack")]
    ConnectionAck { id: PlayerId },

    /// Broadcast to the room channel after every mutation.
    #[serde(rename = "room:state")]
    State(RoomSnapshot),

    /// Broadcast once, when the room flips to started.
    #[serde(rename = "room:started")]
    Started { code: String },

    /// Unicast to the connection whose request failed.
    #[serde(rename = "room:error")]
    Error { message: String },
}
