pub mod board;
pub mod error;
pub mod messages;
pub mod stats;

#[cfg(test)]
mod board_test;

pub use board::{Board, Position, Ship, ShotRecord, ShotType};
pub use error::CoreError;
pub use stats::{PlayerStats, UserGlobalStats};

pub type UserId = i64;
pub type MatchId = uuid::Uuid;
pub type ShipId = uuid::Uuid;
pub type ConnId = uuid::Uuid;

/// Bumped whenever a wire-incompatible change lands in [`messages`].
pub const PROTOCOL_VERSION: u8 = 1;
