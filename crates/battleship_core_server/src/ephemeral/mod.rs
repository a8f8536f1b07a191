pub mod memory_store;
pub mod redis_store;

use async_trait::async_trait;
use battleship_core_common::error::CoreResult;
use battleship_core_common::{ConnId, MatchId, UserId};

/// The fast key-value contract of §4.1. Both implementations (in-memory, Redis) satisfy
/// this exact trait, so handler and orchestrator logic never knows which one is behind it.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn set_turn(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn get_turn(&self, match_id: MatchId) -> CoreResult<Option<UserId>>;
    async fn clear_turn(&self, match_id: MatchId) -> CoreResult<()>;

    async fn set_turn_timeout_owner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn get_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<Option<UserId>>;
    async fn clear_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<()>;

    async fn incr_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32>;
    async fn reset_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;

    async fn mark_ready(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<()>;
    async fn all_ready(&self, match_id: MatchId, expected: &[ConnId]) -> CoreResult<bool>;
    async fn clear_ready(&self, match_id: MatchId) -> CoreResult<()>;

    async fn set_team(&self, match_id: MatchId, conn_id: ConnId, team: i32) -> CoreResult<()>;
    async fn get_team(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<Option<i32>>;
    async fn all_teams(&self, match_id: MatchId) -> CoreResult<Vec<(ConnId, i32)>>;
    async fn clear_teams(&self, match_id: MatchId) -> CoreResult<()>;

    async fn incr_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32>;
    async fn reset_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn unlock_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn has_nuclear_available(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool>;
    async fn mark_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn has_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool>;
    async fn clear_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;

    async fn mark_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()>;
    async fn is_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool>;

    async fn save_conn(&self, conn_id: ConnId, user_id: UserId, match_id: MatchId) -> CoreResult<()>;
    async fn get_conn(&self, conn_id: ConnId) -> CoreResult<Option<(UserId, MatchId)>>;
    async fn delete_conn(&self, conn_id: ConnId) -> CoreResult<()>;

    async fn set_last_match_by_user(&self, user_id: UserId, match_id: MatchId) -> CoreResult<()>;
    async fn get_last_match_by_user(&self, user_id: UserId) -> CoreResult<Option<MatchId>>;

    /// Fans out every match-scoped clear. A single failing sub-operation is logged but
    /// must not prevent the others from being attempted (§4.1).
    async fn clear_match(&self, match_id: MatchId, user_ids: &[UserId]) -> CoreResult<()> {
        let mut first_err = None;
        if let Err(e) = self.clear_turn(match_id).await {
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.clear_turn_timeout_owner(match_id).await {
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.clear_ready(match_id).await {
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.clear_teams(match_id).await {
            first_err.get_or_insert(e);
        }
        for &uid in user_ids {
            if let Err(e) = self.reset_missed(match_id, uid).await {
                first_err.get_or_insert(e);
            }
            if let Err(e) = self.clear_nuclear(match_id, uid).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
