//! Party-room lifecycle for Slip.
//!
//! Everything here is synchronous, in-memory state manipulation. The
//! gateway owns one [`RoomRegistry`] and feeds it [`Command`]s; each
//! command runs to completion and returns the [`Effect`]s the gateway
//! must carry out (channel subscriptions and outbound events).
//!
//! # Key types
//!
//! - [`RoomRegistry`]: owns every live [`Room`] and the expiry sweep
//! - [`Room`]: one lobby with its players, readiness, and host succession
//! - [`RoomCode`]: validated 5-symbol join code, see [`code`]
//! - [`RoomPhase`]: lobby → active, one way
//! - [`Command`] / [`Effect`]: the pure dispatch boundary

pub mod code;
mod command;
mod config;
mod error;
mod registry;
mod room;

pub use code::RoomCode;
pub use command::{Command, Effect, Recipient};
pub use config::{RoomConfig, RoomPhase};
pub use error::RoomError;
pub use registry::{ExpiredRoom, RoomRegistry};
pub use room::{Departure, Player, Room, DEFAULT_PLAYER_NAME};
