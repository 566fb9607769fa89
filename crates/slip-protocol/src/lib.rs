//! Wire protocol for the Slip room server.
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): the named events that
//!   travel between browser and server, one JSON object per frame:
//!   `{"event": "room:join", "data": {"code": "K3XZQ", "name": "Ana"}}`.
//! - **Snapshots** ([`RoomSnapshot`], [`PlayerSnapshot`]): the full room
//!   state broadcast after every mutation.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, events out.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Room (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientEvent, PlayerId, PlayerSnapshot, RoomSnapshot, ServerEvent};
