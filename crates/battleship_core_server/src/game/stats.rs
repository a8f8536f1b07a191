use battleship_core_common::board::{Board, ShotRecord};
use battleship_core_common::{MatchId, PlayerStats, UserId};

use crate::persistence::models::MatchPlayer;

/// Derives per-player [`PlayerStats`] from a final board, per §4.9. Pure: takes the full
/// shot history and ship ownership and folds each shot into the shooter's running stat.
pub fn compute_stats(match_id: MatchId, players: &[MatchPlayer], board: &Board) -> Vec<PlayerStats> {
    let mut by_user: std::collections::HashMap<UserId, PlayerStats> = players
        .iter()
        .map(|p| (p.user_id, PlayerStats::new(match_id, p.user_id)))
        .collect();

    let mut turns_taken: std::collections::HashMap<UserId, u32> = std::collections::HashMap::new();

    for shot in dedup_by_shooter_turn(&board.shots) {
        if let Some(stat) = by_user.get_mut(&shot.shooter_id) {
            stat.record_shot(shot.shot_type, shot.hit);
            if shot.sunk_ship_id.is_some() {
                stat.ships_sunk += 1;
            }
        }
        *turns_taken.entry(shot.shooter_id).or_insert(0) += 1;
    }

    for p in players {
        if let Some(stat) = by_user.get_mut(&p.user_id) {
            stat.was_winner = p.is_winner;
            stat.was_eliminated = p.left_at.is_some() && !p.is_winner;
            stat.ships_remaining = board.ships_owned_by(p.user_id).filter(|s| !s.is_sunk).count() as u32;
            stat.turns_taken = *turns_taken.get(&p.user_id).unwrap_or(&0);
        }
    }

    let mut out: Vec<PlayerStats> = by_user.into_values().collect();
    out.sort_by_key(|s| s.user_id);
    out
}

/// `multi`-type shots record one [`ShotRecord`] per cell but should count as a single turn
/// and a single "shot" toward accuracy — this folds consecutive same-shooter, same-type,
/// same-timestamp records from one multi/nuclear/etc. pattern into one logical shot.
fn dedup_by_shooter_turn(shots: &[ShotRecord]) -> Vec<ShotRecord> {
    let mut out: Vec<ShotRecord> = Vec::new();
    for shot in shots {
        if let Some(last) = out.last_mut() {
            if last.shooter_id == shot.shooter_id && last.shot_type == shot.shot_type && last.created_at == shot.created_at {
                last.hit |= shot.hit;
                last.sunk_ship_id = last.sunk_ship_id.or(shot.sunk_ship_id);
                continue;
            }
        }
        out.push(shot.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use battleship_core_common::board::{Position, Ship, ShotType};

    fn player(user_id: UserId, is_winner: bool) -> MatchPlayer {
        MatchPlayer {
            id: uuid::Uuid::new_v4(),
            match_id: uuid::Uuid::new_v4(),
            user_id,
            team: None,
            is_winner,
            left_at: if is_winner { None } else { Some(chrono::Utc::now()) },
            joined_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn accuracy_and_ships_sunk_are_derived_from_shots() {
        let match_id = MatchId::new_v4();
        let ship_id = uuid::Uuid::new_v4();
        let mut board = Board::new(10, vec![Ship { ship_id, owner_id: 2, team_id: None, positions: vec![Position { row: 0, col: 0, is_hit: true }], is_sunk: true }]);
        board.shots = vec![
            ShotRecord { id: uuid::Uuid::new_v4(), shooter_id: 1, shot_type: ShotType::Simple, target: (0, 0), hit: true, sunk_ship_id: Some(ship_id), created_at: chrono::Utc::now() },
            ShotRecord { id: uuid::Uuid::new_v4(), shooter_id: 1, shot_type: ShotType::Simple, target: (5, 5), hit: false, sunk_ship_id: None, created_at: chrono::Utc::now() },
        ];
        let players = vec![player(1, true), player(2, false)];
        let stats = compute_stats(match_id, &players, &board);
        let winner = stats.iter().find(|s| s.user_id == 1).unwrap();
        assert_eq!(winner.total_shots, 2);
        assert_eq!(winner.successful_shots, 1);
        assert_eq!(winner.ships_sunk, 1);
        assert_eq!(winner.accuracy(), 50.0);
    }
}
