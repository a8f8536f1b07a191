//! Wire types for the JSON-over-WebSocket transport (§6.2.1). Every inbound frame decodes to
//! an [`InboundMessage`]; every outbound frame encodes an [`OutboundEvent`]. Tagged with
//! `type`/`payload` so a thin client can dispatch on `type` without knowing every variant.

use serde::{Deserialize, Serialize};

use crate::board::ShotType;
use crate::{MatchId, ShipId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRole {
    Player,
    Spectator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    PlayerJoin { match_id: MatchId, role: JoinRole },
    PlayerReady { match_id: MatchId },
    PlayerChooseTeam { match_id: MatchId, team: i32 },
    PlayerLeave { match_id: MatchId },
    CreatorTransfer { match_id: MatchId, target_user_id: UserId },
    GameStart { match_id: MatchId },
    PlayerFire { match_id: MatchId, x: u8, y: u8, shot_type: ShotType, extra_targets: Vec<(u8, u8)> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Individual,
    Teams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { success: true, error: None }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Ack { success: false, error: Some(msg.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerShip {
    pub ship_id: ShipId,
    pub owner_id: UserId,
    pub nickname: String,
    pub color: String,
    pub is_sunk: bool,
    pub impacted_positions: u32,
    pub total_positions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotResult {
    Hit,
    Miss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerShot {
    pub row: u8,
    pub col: u8,
    pub result: ShotResult,
}

/// The per-viewer board projection of §4.8 "Board view".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub size: u8,
    pub ships: Vec<ViewerShip>,
    pub shots: Vec<ViewerShot>,
    pub my_ships: Vec<ViewerShip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
    PlayerJoined { user_id: UserId, nickname: String, role: JoinRole },
    PlayerJoinedAck(Ack),
    SpectatorJoinedAck(Ack),
    JoinDenied { reason: String },
    PlayerLeft { user_id: UserId },
    CreatorChanged { new_creator_id: UserId },
    PlayerReadyNotify { user_id: UserId },
    PlayerReadyAck(Ack),
    AllReady,
    PlayerTeamAssigned { user_id: UserId, team: i32 },
    CreatorTransferAck(Ack),
    GameStarted { mode: GameMode, board_size: u8 },
    GameStartAck(Ack),
    TurnChanged { user_id: UserId },
    TurnTimeout { user_id: UserId },
    PlayerFired { shooter_id: UserId, x: u8, y: u8, shot_type: ShotType, hit: bool, sunk_ship_id: Option<ShipId> },
    PlayerFireAck(Ack),
    NuclearStatus { progress: u32, has_nuclear: bool, used: bool },
    PlayerEliminated { user_id: UserId },
    GameEnded { mode: GameMode, winner_user_id: Option<UserId>, winning_team: Option<i32> },
    GameAbandoned,
    BoardUpdate(BoardView),
    PlayerReconnected { user_id: UserId },
    ReconnectAck(Ack),
    ReconnectFailed { reason: String },
    PlayerKicked { reason: String },
    Error { code: String, message: String },
    Heartbeat,
}
