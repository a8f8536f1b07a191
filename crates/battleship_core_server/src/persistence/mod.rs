pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use battleship_core_common::board::{Board, ShotType};
use battleship_core_common::error::CoreResult;
use battleship_core_common::{MatchId, PlayerStats, ShipId, UserGlobalStats, UserId};

use models::{Match, MatchMode, MatchWithPlayers, PersistedShot};

#[async_trait]
pub trait MatchRepo: Send + Sync {
    async fn create_with_creator(&self, m: Match) -> CoreResult<Match>;
    async fn find_by_id(&self, match_id: MatchId) -> CoreResult<Option<MatchWithPlayers>>;
    async fn update_creator(&self, match_id: MatchId, new_creator_id: UserId) -> CoreResult<()>;
    async fn update_start_board(&self, match_id: MatchId, board: Board) -> CoreResult<()>;
    async fn update_board(&self, match_id: MatchId, board: Board) -> CoreResult<()>;
    async fn mark_finished(&self, match_id: MatchId) -> CoreResult<()>;
    /// Cascading delete of shots, spectators, and players before the match row itself.
    /// Must run as a single transaction (§4.11).
    async fn remove_abandoned(&self, match_id: MatchId) -> CoreResult<()>;
    async fn add_player(&self, match_id: MatchId, user_id: UserId, team: Option<i32>) -> CoreResult<()>;
}

#[async_trait]
pub trait PlayerRepo: Send + Sync {
    async fn mark_defeated_by_user(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn mark_defeated_by_id(&self, player_id: uuid::Uuid) -> CoreResult<()>;
    async fn mark_winner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn mark_team_players_as_winners(&self, match_id: MatchId, team: i32) -> CoreResult<()>;
    async fn mark_left(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
}

#[async_trait]
pub trait ShotRepo: Send + Sync {
    async fn register(
        &self,
        match_id: MatchId,
        shooter_id: UserId,
        shot_type: ShotType,
        target: (u8, u8),
        hit: bool,
        sunk_ship_id: Option<ShipId>,
    ) -> CoreResult<PersistedShot>;
}

#[async_trait]
pub trait SpectatorRepo: Send + Sync {
    async fn find_first(&self, match_id: MatchId, user_id: UserId) -> CoreResult<Option<models::Spectator>>;
    async fn insert(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn save_many(&self, match_id: MatchId, stats: Vec<PlayerStats>) -> CoreResult<()>;
    async fn find_by_match_id(&self, match_id: MatchId) -> CoreResult<Vec<PlayerStats>>;
    async fn find_by_user_id_with_match(&self, user_id: UserId) -> CoreResult<Vec<PlayerStats>>;
}

#[async_trait]
pub trait UserGlobalStatsRepo: Send + Sync {
    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Option<UserGlobalStats>>;
    async fn upsert_from_match_stats(&self, stats: &PlayerStats, now: chrono::DateTime<chrono::Utc>) -> CoreResult<UserGlobalStats>;
}

/// The full set of repositories a match actor needs, bundled for convenient injection.
pub struct Repositories {
    pub matches: std::sync::Arc<dyn MatchRepo>,
    pub players: std::sync::Arc<dyn PlayerRepo>,
    pub shots: std::sync::Arc<dyn ShotRepo>,
    pub spectators: std::sync::Arc<dyn SpectatorRepo>,
    pub stats: std::sync::Arc<dyn StatsRepo>,
    pub user_global_stats: std::sync::Arc<dyn UserGlobalStatsRepo>,
}

pub use models::Match as MatchModel;
pub use MatchMode as Mode;
