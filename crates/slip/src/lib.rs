//! # Slip
//!
//! Real-time party-room server.
//!
//! Players create a room, share its five-character code, join, mark
//! themselves ready, and the host starts the session. Every change is
//! broadcast to the room as a full `room:state` snapshot over WebSocket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slip::prelude::*;
//!
//! # async fn start() -> Result<(), SlipError> {
//! let server = SlipServer::builder().bind("0.0.0.0:5001").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod hub;
pub mod logging;
mod server;

pub use error::SlipError;
pub use server::{
    DEFAULT_CLIENT_QUEUE_SIZE, DEFAULT_HUB_QUEUE_SIZE, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_KEEPALIVE_INTERVAL, SlipServer, SlipServerBuilder,
};

/// Everything needed to run a server or speak its protocol.
pub mod prelude {
    pub use crate::{SlipError, SlipServer, SlipServerBuilder};
    pub use slip_protocol::{
        ClientEvent, Codec, JsonCodec, PlayerId, PlayerSnapshot, ProtocolError, RoomSnapshot,
        ServerEvent,
    };
    pub use slip_room::{RoomCode, RoomConfig, RoomError};
    pub use slip_transport::TransportError;
}
