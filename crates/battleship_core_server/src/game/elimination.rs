use std::sync::Arc;

use battleship_core_common::board::Board;
use battleship_core_common::error::CoreResult;
use battleship_core_common::{MatchId, UserId};

use crate::persistence::models::MatchPlayer;
use crate::persistence::PlayerRepo;

/// Scans every still-active player and reports (and persists) elimination for anyone with
/// no live ships left, per §4.5. Order is stable by join order, matching the player list's
/// natural ordering from the repository.
pub async fn detect_and_mark(
    match_id: MatchId,
    players: &[MatchPlayer],
    board: &Board,
    player_repo: &Arc<dyn PlayerRepo>,
) -> CoreResult<Vec<UserId>> {
    let mut eliminated = Vec::new();
    for p in players.iter().filter(|p| p.is_active()) {
        if !board.has_ships_alive(p.user_id) {
            player_repo.mark_defeated_by_user(match_id, p.user_id).await?;
            eliminated.push(p.user_id);
        }
    }
    Ok(eliminated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryRepos;
    use battleship_core_common::board::{Position, Ship};
    use std::sync::Arc as StdArc;

    fn player(user_id: UserId) -> MatchPlayer {
        MatchPlayer {
            id: uuid::Uuid::new_v4(),
            match_id: uuid::Uuid::new_v4(),
            user_id,
            team: None,
            is_winner: false,
            left_at: None,
            joined_at: chrono::Utc::now(),
        }
    }

    fn sunk_ship(owner: UserId) -> Ship {
        Ship { ship_id: uuid::Uuid::new_v4(), owner_id: owner, team_id: None, positions: vec![Position { row: 0, col: 0, is_hit: true }], is_sunk: true }
    }

    fn alive_ship(owner: UserId) -> Ship {
        Ship { ship_id: uuid::Uuid::new_v4(), owner_id: owner, team_id: None, positions: vec![Position::new(1, 1)], is_sunk: false }
    }

    #[tokio::test]
    async fn marks_only_players_with_no_live_ships() {
        let repo: StdArc<dyn PlayerRepo> = StdArc::new(InMemoryRepos::new());
        let match_id = battleship_core_common::MatchId::new_v4();
        let players = vec![player(1), player(2)];
        let board = Board::new(10, vec![sunk_ship(1), alive_ship(2)]);
        let eliminated = detect_and_mark(match_id, &players, &board, &repo).await.unwrap();
        assert_eq!(eliminated, vec![1]);
    }
}
