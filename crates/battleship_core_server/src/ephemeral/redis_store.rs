use async_trait::async_trait;
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::{ConnId, MatchId, UserId};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::EphemeralStore;

/// Redis-backed realization of the ephemeral contract, shared across server processes.
/// Keys follow the `{kind}:{matchId}[:{userId}]` scheme of §3 so operational tooling can
/// pattern-scan the store. Counters use `INCR` so concurrent writers from different
/// processes never race each other's reads.
pub struct RedisEphemeralStore {
    conn: ConnectionManager,
}

impl RedisEphemeralStore {
    pub async fn connect(redis_url: &str) -> CoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::transient(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CoreError::transient(format!("redis connect failed: {e}")))?;
        Ok(RedisEphemeralStore { conn })
    }

    fn turn_key(match_id: MatchId) -> String {
        format!("turn:{match_id}")
    }

    fn timeout_owner_key(match_id: MatchId) -> String {
        format!("turnTimeout:{match_id}")
    }

    fn missed_key(match_id: MatchId, user_id: UserId) -> String {
        format!("missed:{match_id}:{user_id}")
    }

    fn ready_key(match_id: MatchId) -> String {
        format!("ready:{match_id}")
    }

    fn team_key(match_id: MatchId) -> String {
        format!("team:{match_id}")
    }

    fn nuclear_progress_key(match_id: MatchId, user_id: UserId) -> String {
        format!("nuclear:{match_id}:{user_id}:progress")
    }

    fn nuclear_available_key(match_id: MatchId, user_id: UserId) -> String {
        format!("nuclear:{match_id}:{user_id}:available")
    }

    fn nuclear_used_key(match_id: MatchId, user_id: UserId) -> String {
        format!("nuclear:{match_id}:{user_id}:used")
    }

    fn abandoned_key(match_id: MatchId, user_id: UserId) -> String {
        format!("abandoned:{match_id}:{user_id}")
    }

    fn conn_key(conn_id: ConnId) -> String {
        format!("conn:{conn_id}")
    }

    fn last_match_key(user_id: UserId) -> String {
        format!("lastMatchByUser:{user_id}")
    }

    fn xient(e: redis::RedisError) -> CoreError {
        CoreError::transient(format!("redis error: {e}"))
    }
}

#[async_trait]
impl EphemeralStore for RedisEphemeralStore {
    async fn set_turn(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::turn_key(match_id), user_id).await.map_err(Self::xient)
    }

    async fn get_turn(&self, match_id: MatchId) -> CoreResult<Option<UserId>> {
        let mut conn = self.conn.clone();
        conn.get(Self::turn_key(match_id)).await.map_err(Self::xient)
    }

    async fn clear_turn(&self, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::turn_key(match_id)).await.map_err(Self::xient)
    }

    async fn set_turn_timeout_owner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::timeout_owner_key(match_id), user_id).await.map_err(Self::xient)
    }

    async fn get_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<Option<UserId>> {
        let mut conn = self.conn.clone();
        conn.get(Self::timeout_owner_key(match_id)).await.map_err(Self::xient)
    }

    async fn clear_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::timeout_owner_key(match_id)).await.map_err(Self::xient)
    }

    async fn incr_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32> {
        let mut conn = self.conn.clone();
        conn.incr(Self::missed_key(match_id, user_id), 1).await.map_err(Self::xient)
    }

    async fn reset_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::missed_key(match_id, user_id)).await.map_err(Self::xient)
    }

    async fn mark_ready(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(Self::ready_key(match_id), conn_id.to_string()).await.map_err(Self::xient)
    }

    async fn all_ready(&self, match_id: MatchId, expected: &[ConnId]) -> CoreResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(Self::ready_key(match_id)).await.map_err(Self::xient)?;
        Ok(expected.iter().all(|c| members.contains(&c.to_string())))
    }

    async fn clear_ready(&self, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::ready_key(match_id)).await.map_err(Self::xient)
    }

    async fn set_team(&self, match_id: MatchId, conn_id: ConnId, team: i32) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(Self::team_key(match_id), conn_id.to_string(), team).await.map_err(Self::xient)
    }

    async fn get_team(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<Option<i32>> {
        let mut conn = self.conn.clone();
        conn.hget(Self::team_key(match_id), conn_id.to_string()).await.map_err(Self::xient)
    }

    async fn all_teams(&self, match_id: MatchId) -> CoreResult<Vec<(ConnId, i32)>> {
        let mut conn = self.conn.clone();
        let map: std::collections::HashMap<String, i32> =
            conn.hgetall(Self::team_key(match_id)).await.map_err(Self::xient)?;
        Ok(map
            .into_iter()
            .filter_map(|(k, v)| k.parse::<ConnId>().ok().map(|c| (c, v)))
            .collect())
    }

    async fn clear_teams(&self, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::team_key(match_id)).await.map_err(Self::xient)
    }

    async fn incr_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32> {
        let mut conn = self.conn.clone();
        conn.incr(Self::nuclear_progress_key(match_id, user_id), 1).await.map_err(Self::xient)
    }

    async fn reset_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::nuclear_progress_key(match_id, user_id)).await.map_err(Self::xient)
    }

    async fn unlock_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::nuclear_available_key(match_id, user_id), true).await.map_err(Self::xient)
    }

    async fn has_nuclear_available(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(Self::nuclear_available_key(match_id, user_id)).await.map_err(Self::xient)
    }

    async fn mark_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::nuclear_used_key(match_id, user_id), true).await.map_err(Self::xient)
    }

    async fn has_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(Self::nuclear_used_key(match_id, user_id)).await.map_err(Self::xient)
    }

    async fn clear_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>((
            Self::nuclear_progress_key(match_id, user_id),
            Self::nuclear_available_key(match_id, user_id),
            Self::nuclear_used_key(match_id, user_id),
        ))
        .await
        .map_err(Self::xient)
    }

    async fn mark_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::abandoned_key(match_id, user_id), true).await.map_err(Self::xient)
    }

    async fn is_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(Self::abandoned_key(match_id, user_id)).await.map_err(Self::xient)
    }

    async fn save_conn(&self, conn_id: ConnId, user_id: UserId, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let value = format!("{user_id}:{match_id}");
        conn.set::<_, _, ()>(Self::conn_key(conn_id), value).await.map_err(Self::xient)
    }

    async fn get_conn(&self, conn_id: ConnId) -> CoreResult<Option<(UserId, MatchId)>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::conn_key(conn_id)).await.map_err(Self::xient)?;
        Ok(raw.and_then(|s| {
            let (uid, mid) = s.split_once(':')?;
            Some((uid.parse().ok()?, mid.parse().ok()?))
        }))
    }

    async fn delete_conn(&self, conn_id: ConnId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::conn_key(conn_id)).await.map_err(Self::xient)
    }

    async fn set_last_match_by_user(&self, user_id: UserId, match_id: MatchId) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::last_match_key(user_id), match_id.to_string()).await.map_err(Self::xient)
    }

    async fn get_last_match_by_user(&self, user_id: UserId) -> CoreResult<Option<MatchId>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::last_match_key(user_id)).await.map_err(Self::xient)?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }
}
