//! An in-memory stand-in for the persistence layer, used by integration tests and by the
//! match actor's own unit tests. Exercises the exact same repository traits the Postgres
//! adapters implement, so handler/orchestrator logic never depends on which backs it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use battleship_core_common::board::{Board, ShotType};
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::{MatchId, PlayerStats, ShipId, UserGlobalStats, UserId};

use super::models::{Match, MatchPlayer, MatchWithPlayers, PersistedShot, Spectator, User};
use super::{MatchRepo, PlayerRepo, ShotRepo, SpectatorRepo, StatsRepo, UserGlobalStatsRepo};

#[derive(Default)]
struct State {
    matches: HashMap<MatchId, Match>,
    players: HashMap<MatchId, Vec<MatchPlayer>>,
    spectators: HashMap<MatchId, Vec<Spectator>>,
    shots: HashMap<MatchId, Vec<PersistedShot>>,
    stats: HashMap<MatchId, Vec<PlayerStats>>,
    user_global_stats: HashMap<UserId, UserGlobalStats>,
    users: HashMap<UserId, User>,
}

#[derive(Default)]
pub struct InMemoryRepos {
    state: Mutex<State>,
}

impl InMemoryRepos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: registers a user so `find_by_id` can populate the `users` map.
    pub fn seed_user(&self, user: User) {
        self.state.lock().unwrap().users.insert(user.id, user);
    }
}

#[async_trait]
impl MatchRepo for InMemoryRepos {
    async fn create_with_creator(&self, m: Match) -> CoreResult<Match> {
        let mut state = self.state.lock().unwrap();
        let player = MatchPlayer {
            id: uuid::Uuid::new_v4(),
            match_id: m.id,
            user_id: m.created_by_id,
            team: None,
            is_winner: false,
            left_at: None,
            joined_at: m.created_at,
        };
        state.players.entry(m.id).or_default().push(player);
        state.matches.insert(m.id, m.clone());
        Ok(m)
    }

    async fn find_by_id(&self, match_id: MatchId) -> CoreResult<Option<MatchWithPlayers>> {
        let state = self.state.lock().unwrap();
        let Some(m) = state.matches.get(&match_id).cloned() else { return Ok(None) };
        let players = state.players.get(&match_id).cloned().unwrap_or_default();
        let spectators = state.spectators.get(&match_id).cloned().unwrap_or_default();
        let users = players
            .iter()
            .filter_map(|p| state.users.get(&p.user_id).cloned().map(|u| (u.id, u)))
            .collect();
        Ok(Some(MatchWithPlayers { m, players, users, spectators }))
    }

    async fn update_creator(&self, match_id: MatchId, new_creator_id: UserId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).ok_or_else(|| CoreError::not_found("match"))?;
        m.created_by_id = new_creator_id;
        Ok(())
    }

    async fn update_start_board(&self, match_id: MatchId, board: Board) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).ok_or_else(|| CoreError::not_found("match"))?;
        m.board = Some(board);
        m.status = super::models::MatchStatus::InProgress;
        Ok(())
    }

    async fn update_board(&self, match_id: MatchId, board: Board) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).ok_or_else(|| CoreError::not_found("match"))?;
        m.board = Some(board);
        Ok(())
    }

    async fn mark_finished(&self, match_id: MatchId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).ok_or_else(|| CoreError::not_found("match"))?;
        m.status = super::models::MatchStatus::Finished;
        Ok(())
    }

    async fn remove_abandoned(&self, match_id: MatchId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.shots.remove(&match_id);
        state.spectators.remove(&match_id);
        state.players.remove(&match_id);
        state.matches.remove(&match_id);
        Ok(())
    }

    async fn add_player(&self, match_id: MatchId, user_id: UserId, team: Option<i32>) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let now = state.matches.get(&match_id).map(|m| m.created_at).unwrap_or_else(chrono::Utc::now);
        let list = state.players.entry(match_id).or_default();
        if list.iter().any(|p| p.user_id == user_id) {
            return Ok(());
        }
        list.push(MatchPlayer {
            id: uuid::Uuid::new_v4(),
            match_id,
            user_id,
            team,
            is_winner: false,
            left_at: None,
            joined_at: now,
        });
        Ok(())
    }
}

#[async_trait]
impl PlayerRepo for InMemoryRepos {
    async fn mark_defeated_by_user(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(list) = state.players.get_mut(&match_id) {
            if let Some(p) = list.iter_mut().find(|p| p.user_id == user_id) {
                p.left_at = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }

    async fn mark_defeated_by_id(&self, player_id: uuid::Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        for list in state.players.values_mut() {
            if let Some(p) = list.iter_mut().find(|p| p.id == player_id) {
                p.left_at = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }

    async fn mark_winner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(list) = state.players.get_mut(&match_id) {
            if let Some(p) = list.iter_mut().find(|p| p.user_id == user_id) {
                p.is_winner = true;
            }
        }
        Ok(())
    }

    async fn mark_team_players_as_winners(&self, match_id: MatchId, team: i32) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(list) = state.players.get_mut(&match_id) {
            for p in list.iter_mut().filter(|p| p.team == Some(team)) {
                p.is_winner = true;
            }
        }
        Ok(())
    }

    async fn mark_left(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.mark_defeated_by_user(match_id, user_id).await
    }
}

#[async_trait]
impl ShotRepo for InMemoryRepos {
    async fn register(
        &self,
        match_id: MatchId,
        shooter_id: UserId,
        shot_type: ShotType,
        target: (u8, u8),
        hit: bool,
        sunk_ship_id: Option<ShipId>,
    ) -> CoreResult<PersistedShot> {
        let shot = PersistedShot {
            id: uuid::Uuid::new_v4(),
            match_id,
            shooter_id,
            shot_type,
            row: target.0,
            col: target.1,
            hit,
            sunk_ship_id,
            created_at: chrono::Utc::now(),
        };
        self.state.lock().unwrap().shots.entry(match_id).or_default().push(shot.clone());
        Ok(shot)
    }
}

#[async_trait]
impl SpectatorRepo for InMemoryRepos {
    async fn find_first(&self, match_id: MatchId, user_id: UserId) -> CoreResult<Option<Spectator>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .spectators
            .get(&match_id)
            .and_then(|list| list.iter().find(|s| s.user_id == user_id).cloned()))
    }

    async fn insert(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let list = state.spectators.entry(match_id).or_default();
        if !list.iter().any(|s| s.user_id == user_id) {
            list.push(Spectator { match_id, user_id });
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRepo for InMemoryRepos {
    async fn save_many(&self, match_id: MatchId, stats: Vec<PlayerStats>) -> CoreResult<()> {
        self.state.lock().unwrap().stats.insert(match_id, stats);
        Ok(())
    }

    async fn find_by_match_id(&self, match_id: MatchId) -> CoreResult<Vec<PlayerStats>> {
        Ok(self.state.lock().unwrap().stats.get(&match_id).cloned().unwrap_or_default())
    }

    async fn find_by_user_id_with_match(&self, user_id: UserId) -> CoreResult<Vec<PlayerStats>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .stats
            .values()
            .flatten()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserGlobalStatsRepo for InMemoryRepos {
    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Option<UserGlobalStats>> {
        Ok(self.state.lock().unwrap().user_global_stats.get(&user_id).cloned())
    }

    async fn upsert_from_match_stats(&self, stats: &PlayerStats, now: chrono::DateTime<chrono::Utc>) -> CoreResult<UserGlobalStats> {
        let mut state = self.state.lock().unwrap();
        let entry = state.user_global_stats.entry(stats.user_id).or_insert_with(|| UserGlobalStats {
            user_id: stats.user_id,
            ..Default::default()
        });
        entry.apply_match(stats, now);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::models::{Difficulty, MatchMode, MatchStatus};

    fn sample_match(id: MatchId) -> Match {
        Match {
            id,
            name: None,
            access_code: None,
            is_public: true,
            is_matchmaking: false,
            max_players: 2,
            mode: MatchMode::Individual,
            difficulty: Difficulty::Easy,
            team_count: None,
            created_by_id: 1,
            status: MatchStatus::Waiting,
            board: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trips() {
        let repo = InMemoryRepos::new();
        let id = MatchId::new_v4();
        repo.create_with_creator(sample_match(id)).await.unwrap();
        let found = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.players.len(), 1);
        assert_eq!(found.m.created_by_id, 1);
    }

    #[tokio::test]
    async fn remove_abandoned_clears_everything() {
        let repo = InMemoryRepos::new();
        let id = MatchId::new_v4();
        repo.create_with_creator(sample_match(id)).await.unwrap();
        repo.remove_abandoned(id).await.unwrap();
        assert!(repo.find_by_id(id).await.unwrap().is_none());
    }
}
