use battleship_core_common::board::{Board, ShotType};
use battleship_core_common::{MatchId, ShipId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Individual,
    Teams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub name: Option<String>,
    pub access_code: Option<String>,
    pub is_public: bool,
    pub is_matchmaking: bool,
    pub max_players: u32,
    pub mode: MatchMode,
    pub difficulty: Difficulty,
    pub team_count: Option<u32>,
    pub created_by_id: UserId,
    pub status: MatchStatus,
    pub board: Option<Board>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub id: uuid::Uuid,
    pub match_id: MatchId,
    pub user_id: UserId,
    pub team: Option<i32>,
    pub is_winner: bool,
    pub left_at: Option<chrono::DateTime<chrono::Utc>>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl MatchPlayer {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectator {
    pub match_id: MatchId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedShot {
    pub id: uuid::Uuid,
    pub match_id: MatchId,
    pub shooter_id: UserId,
    pub shot_type: ShotType,
    pub row: u8,
    pub col: u8,
    pub hit: bool,
    pub sunk_ship_id: Option<ShipId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub color: String,
}

/// A match together with the related rows the handlers and orchestrator need in one shot,
/// mirroring the `+withPlayers,+withUsers,+withSpectators` loaders of §6.3.
#[derive(Debug, Clone)]
pub struct MatchWithPlayers {
    pub m: Match,
    pub players: Vec<MatchPlayer>,
    pub users: std::collections::HashMap<UserId, User>,
    pub spectators: Vec<Spectator>,
}

impl MatchWithPlayers {
    pub fn alive_user_ids(&self) -> Vec<UserId> {
        self.players.iter().filter(|p| p.is_active()).map(|p| p.user_id).collect()
    }

    pub fn player(&self, user_id: UserId) -> Option<&MatchPlayer> {
        self.players.iter().find(|p| p.user_id == user_id)
    }
}
