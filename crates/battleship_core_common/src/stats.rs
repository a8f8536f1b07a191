use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{board::ShotType, MatchId, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub match_id: Option<MatchId>,
    pub user_id: UserId,
    pub total_shots: u32,
    pub successful_shots: u32,
    pub ships_sunk: u32,
    pub was_winner: bool,
    pub was_eliminated: bool,
    pub turns_taken: u32,
    pub ships_remaining: u32,
    pub hit_streak: u32,
    pub last_shot_was_hit: bool,
    pub shots_by_type: HashMap<ShotType, u32>,
}

impl PlayerStats {
    pub fn new(match_id: MatchId, user_id: UserId) -> Self {
        PlayerStats { match_id: Some(match_id), user_id, ..Default::default() }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_shots == 0 {
            0.0
        } else {
            ((self.successful_shots as f64 / self.total_shots as f64) * 10000.0).round() / 100.0
        }
    }

    pub fn record_shot(&mut self, shot_type: ShotType, hit: bool) {
        self.total_shots += 1;
        *self.shots_by_type.entry(shot_type).or_insert(0) += 1;
        self.last_shot_was_hit = hit;
        if hit {
            self.successful_shots += 1;
            self.hit_streak += 1;
        } else {
            self.hit_streak = 0;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGlobalStats {
    pub user_id: UserId,
    pub matches_played: u32,
    pub matches_won: u32,
    pub total_shots: u32,
    pub successful_shots: u32,
    pub accuracy: f64,
    pub ships_sunk: u32,
    pub max_hit_streak: u32,
    pub nuclear_used: u32,
    pub last_game_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserGlobalStats {
    /// Folds one finished match's [`PlayerStats`] into the running aggregate, per §4.9.
    pub fn apply_match(&mut self, stats: &PlayerStats, now: chrono::DateTime<chrono::Utc>) {
        self.matches_played += 1;
        if stats.was_winner {
            self.matches_won += 1;
        }
        self.total_shots += stats.total_shots;
        self.successful_shots += stats.successful_shots;
        self.accuracy = if self.total_shots == 0 {
            0.0
        } else {
            ((self.successful_shots as f64 / self.total_shots as f64) * 10000.0).round() / 100.0
        };
        self.ships_sunk += stats.ships_sunk;
        self.max_hit_streak = self.max_hit_streak.max(stats.hit_streak);
        self.nuclear_used += stats.shots_by_type.get(&ShotType::Nuclear).copied().unwrap_or(0);
        self.last_game_at = Some(now);
    }
}
