//! Error types for the room layer.

use slip_protocol::PlayerId;

use crate::RoomCode;

/// Everything that can go wrong applying a room operation.
///
/// All variants except [`RoomError::Internal`] are expected outcomes of
/// client requests; the gateway reports them to the requester through
/// [`client_message`](Self::client_message) and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code. Holds the code as the client sent it.
    #[error("room {0:?} not found")]
    RoomNotFound(String),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Join attempted after the room started.
    #[error("room {0} has already started")]
    GameAlreadyStarted(RoomCode),

    #[error("player {0} already in room {1}")]
    AlreadyJoined(PlayerId, RoomCode),

    /// The requesting connection is not a member of the room.
    #[error("player {0} not in room {1}")]
    PlayerNotFound(PlayerId, RoomCode),

    #[error("player {0} is not the host of room {1}")]
    NotHost(PlayerId, RoomCode),

    #[error("room {code} has {count} players, needs {min}")]
    InsufficientPlayers {
        code: RoomCode,
        count: usize,
        min: usize,
    },

    #[error("not every player in room {0} is ready")]
    PlayersNotReady(RoomCode),

    /// Start requested for a room that is already active.
    #[error("room {0} was already started")]
    AlreadyStarted(RoomCode),

    /// A registry invariant was found broken. Logged in full, never shown
    /// to clients.
    #[error("internal room error: {0}")]
    Internal(String),
}

impl RoomError {
    /// The stable, user-facing text sent in `room:error`.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "Room not found",
            Self::RoomFull(_) => "Room is full",
            Self::GameAlreadyStarted(_) => "Game already started",
            Self::AlreadyJoined(..) => "You are already in this room",
            Self::PlayerNotFound(..) => "You are not in this room",
            Self::NotHost(..) => "Only the host can start the game",
            Self::InsufficientPlayers { .. } => "Not enough players to start",
            Self::PlayersNotReady(_) => "All players must be ready",
            Self::AlreadyStarted(_) => "Game has already been started",
            Self::Internal(_) => "Something went wrong",
        }
    }

    /// Returns `true` for conditions caused by the client's request rather
    /// than by a server bug.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::parse("K3XZQ").unwrap()
    }

    #[test]
    fn test_client_message_hides_internal_detail() {
        let err = RoomError::Internal("index points at R-missing".into());
        assert_eq!(err.client_message(), "Something went wrong");
        assert!(!err.is_expected());
        assert!(err.to_string().contains("R-missing"));
    }

    #[test]
    fn test_each_expected_kind_has_distinct_message() {
        let errors = [
            RoomError::RoomNotFound("ZZZZZ".into()),
            RoomError::RoomFull(code()),
            RoomError::GameAlreadyStarted(code()),
            RoomError::AlreadyJoined(PlayerId(1), code()),
            RoomError::PlayerNotFound(PlayerId(1), code()),
            RoomError::NotHost(PlayerId(1), code()),
            RoomError::InsufficientPlayers { code: code(), count: 1, min: 2 },
            RoomError::PlayersNotReady(code()),
            RoomError::AlreadyStarted(code()),
        ];
        let mut seen = std::collections::HashSet::new();
        for err in &errors {
            assert!(err.is_expected());
            assert!(seen.insert(err.client_message()), "duplicate message for {err:?}");
        }
    }
}
