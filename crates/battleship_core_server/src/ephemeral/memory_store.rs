use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use battleship_core_common::error::CoreResult;
use battleship_core_common::{ConnId, MatchId, UserId};

use super::EphemeralStore;

/// In-memory realization of the ephemeral contract, used by tests and single-process
/// deployments that don't need cross-process sharing. Guarded by a plain [`Mutex`] rather
/// than `tokio::sync::RwLock`: every operation here is a short, non-blocking map mutation,
/// so there is never a reason to hold the lock across an `.await`.
#[derive(Default)]
pub struct InMemoryEphemeralStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    turn: HashMap<MatchId, UserId>,
    turn_timeout_owner: HashMap<MatchId, UserId>,
    missed: HashMap<(MatchId, UserId), u32>,
    ready: HashMap<MatchId, HashSet<ConnId>>,
    teams: HashMap<MatchId, HashMap<ConnId, i32>>,
    nuclear_progress: HashMap<(MatchId, UserId), u32>,
    nuclear_available: HashSet<(MatchId, UserId)>,
    nuclear_used: HashSet<(MatchId, UserId)>,
    abandoned: HashSet<(MatchId, UserId)>,
    conns: HashMap<ConnId, (UserId, MatchId)>,
    last_match_by_user: HashMap<UserId, MatchId>,
}

impl InMemoryEphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralStore for InMemoryEphemeralStore {
    async fn set_turn(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().turn.insert(match_id, user_id);
        Ok(())
    }

    async fn get_turn(&self, match_id: MatchId) -> CoreResult<Option<UserId>> {
        Ok(self.inner.lock().unwrap().turn.get(&match_id).copied())
    }

    async fn clear_turn(&self, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().turn.remove(&match_id);
        Ok(())
    }

    async fn set_turn_timeout_owner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().turn_timeout_owner.insert(match_id, user_id);
        Ok(())
    }

    async fn get_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<Option<UserId>> {
        Ok(self.inner.lock().unwrap().turn_timeout_owner.get(&match_id).copied())
    }

    async fn clear_turn_timeout_owner(&self, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().turn_timeout_owner.remove(&match_id);
        Ok(())
    }

    async fn incr_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32> {
        let mut guard = self.inner.lock().unwrap();
        let counter = guard.missed.entry((match_id, user_id)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn reset_missed(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().missed.remove(&(match_id, user_id));
        Ok(())
    }

    async fn mark_ready(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<()> {
        self.inner.lock().unwrap().ready.entry(match_id).or_default().insert(conn_id);
        Ok(())
    }

    async fn all_ready(&self, match_id: MatchId, expected: &[ConnId]) -> CoreResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }
        let guard = self.inner.lock().unwrap();
        let set = guard.ready.get(&match_id);
        Ok(match set {
            Some(set) => expected.iter().all(|c| set.contains(c)),
            None => false,
        })
    }

    async fn clear_ready(&self, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().ready.remove(&match_id);
        Ok(())
    }

    async fn set_team(&self, match_id: MatchId, conn_id: ConnId, team: i32) -> CoreResult<()> {
        self.inner.lock().unwrap().teams.entry(match_id).or_default().insert(conn_id, team);
        Ok(())
    }

    async fn get_team(&self, match_id: MatchId, conn_id: ConnId) -> CoreResult<Option<i32>> {
        Ok(self.inner.lock().unwrap().teams.get(&match_id).and_then(|m| m.get(&conn_id)).copied())
    }

    async fn all_teams(&self, match_id: MatchId) -> CoreResult<Vec<(ConnId, i32)>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .teams
            .get(&match_id)
            .map(|m| m.iter().map(|(&k, &v)| (k, v)).collect())
            .unwrap_or_default())
    }

    async fn clear_teams(&self, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().teams.remove(&match_id);
        Ok(())
    }

    async fn incr_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<u32> {
        let mut guard = self.inner.lock().unwrap();
        let counter = guard.nuclear_progress.entry((match_id, user_id)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn reset_nuclear_progress(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().nuclear_progress.remove(&(match_id, user_id));
        Ok(())
    }

    async fn unlock_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().nuclear_available.insert((match_id, user_id));
        Ok(())
    }

    async fn has_nuclear_available(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        Ok(self.inner.lock().unwrap().nuclear_available.contains(&(match_id, user_id)))
    }

    async fn mark_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().nuclear_used.insert((match_id, user_id));
        Ok(())
    }

    async fn has_nuclear_used(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        Ok(self.inner.lock().unwrap().nuclear_used.contains(&(match_id, user_id)))
    }

    async fn clear_nuclear(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut guard = self.inner.lock().unwrap();
        guard.nuclear_progress.remove(&(match_id, user_id));
        guard.nuclear_available.remove(&(match_id, user_id));
        guard.nuclear_used.remove(&(match_id, user_id));
        Ok(())
    }

    async fn mark_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.inner.lock().unwrap().abandoned.insert((match_id, user_id));
        Ok(())
    }

    async fn is_abandoned(&self, match_id: MatchId, user_id: UserId) -> CoreResult<bool> {
        Ok(self.inner.lock().unwrap().abandoned.contains(&(match_id, user_id)))
    }

    async fn save_conn(&self, conn_id: ConnId, user_id: UserId, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().conns.insert(conn_id, (user_id, match_id));
        Ok(())
    }

    async fn get_conn(&self, conn_id: ConnId) -> CoreResult<Option<(UserId, MatchId)>> {
        Ok(self.inner.lock().unwrap().conns.get(&conn_id).copied())
    }

    async fn delete_conn(&self, conn_id: ConnId) -> CoreResult<()> {
        self.inner.lock().unwrap().conns.remove(&conn_id);
        Ok(())
    }

    async fn set_last_match_by_user(&self, user_id: UserId, match_id: MatchId) -> CoreResult<()> {
        self.inner.lock().unwrap().last_match_by_user.insert(user_id, match_id);
        Ok(())
    }

    async fn get_last_match_by_user(&self, user_id: UserId) -> CoreResult<Option<MatchId>> {
        Ok(self.inner.lock().unwrap().last_match_by_user.get(&user_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missed_counter_increments_and_resets() {
        let store = InMemoryEphemeralStore::new();
        let match_id = MatchId::new_v4();
        assert_eq!(store.incr_missed(match_id, 1).await.unwrap(), 1);
        assert_eq!(store.incr_missed(match_id, 1).await.unwrap(), 2);
        store.reset_missed(match_id, 1).await.unwrap();
        assert_eq!(store.incr_missed(match_id, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn all_ready_requires_every_expected_connection() {
        let store = InMemoryEphemeralStore::new();
        let match_id = MatchId::new_v4();
        let a = ConnId::new_v4();
        let b = ConnId::new_v4();
        store.mark_ready(match_id, a).await.unwrap();
        assert!(!store.all_ready(match_id, &[a, b]).await.unwrap());
        store.mark_ready(match_id, b).await.unwrap();
        assert!(store.all_ready(match_id, &[a, b]).await.unwrap());
    }

    #[tokio::test]
    async fn nuclear_lifecycle() {
        let store = InMemoryEphemeralStore::new();
        let match_id = MatchId::new_v4();
        assert!(!store.has_nuclear_available(match_id, 1).await.unwrap());
        store.unlock_nuclear(match_id, 1).await.unwrap();
        assert!(store.has_nuclear_available(match_id, 1).await.unwrap());
        store.mark_nuclear_used(match_id, 1).await.unwrap();
        assert!(store.has_nuclear_used(match_id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn clear_match_is_idempotent() {
        let store = InMemoryEphemeralStore::new();
        let match_id = MatchId::new_v4();
        store.set_turn(match_id, 1).await.unwrap();
        store.clear_match(match_id, &[1]).await.unwrap();
        store.clear_match(match_id, &[1]).await.unwrap();
        assert_eq!(store.get_turn(match_id).await.unwrap(), None);
    }
}
