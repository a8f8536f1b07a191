use battleship_core_common::board::Board;
use battleship_core_common::messages::{BoardView, ShotResult, ViewerShip, ViewerShot};
use battleship_core_common::UserId;

use crate::persistence::models::{MatchMode, User};

/// The per-viewer board projection of §4.8 "Board view": ships are visible to their owner
/// and (in teams mode) teammates; everyone sees the shared shot history.
pub fn project(board: &Board, viewer: UserId, mode: MatchMode, users: &std::collections::HashMap<UserId, User>) -> BoardView {
    let viewer_team = board.ships.iter().find(|s| s.owner_id == viewer).and_then(|s| s.team_id);

    let visible = |ship: &battleship_core_common::board::Ship| {
        ship.owner_id == viewer || (mode == MatchMode::Teams && viewer_team.is_some() && ship.team_id == viewer_team)
    };

    let to_viewer_ship = |ship: &battleship_core_common::board::Ship| ViewerShip {
        ship_id: ship.ship_id,
        owner_id: ship.owner_id,
        nickname: users.get(&ship.owner_id).map(|u| u.nickname.clone()).unwrap_or_default(),
        color: users.get(&ship.owner_id).map(|u| u.color.clone()).unwrap_or_default(),
        is_sunk: ship.is_sunk,
        impacted_positions: ship.positions.iter().filter(|p| p.is_hit).count() as u32,
        total_positions: ship.positions.len() as u32,
    };

    let ships: Vec<ViewerShip> = board.ships.iter().filter(|s| visible(s)).map(to_viewer_ship).collect();
    let my_ships: Vec<ViewerShip> = board.ships.iter().filter(|s| s.owner_id == viewer).map(to_viewer_ship).collect();
    let shots: Vec<ViewerShot> = board
        .shots
        .iter()
        .map(|s| ViewerShot {
            row: s.target.0,
            col: s.target.1,
            result: if s.hit { ShotResult::Hit } else { ShotResult::Miss },
        })
        .collect();

    BoardView { size: board.size, ships, shots, my_ships }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battleship_core_common::board::{Position, Ship};

    fn ship(owner: UserId, team: Option<i32>) -> Ship {
        Ship { ship_id: uuid::Uuid::new_v4(), owner_id: owner, team_id: team, positions: vec![Position::new(0, 0)], is_sunk: false }
    }

    #[test]
    fn individual_mode_hides_enemy_ships() {
        let board = Board::new(10, vec![ship(1, None), ship(2, None)]);
        let view = project(&board, 1, MatchMode::Individual, &Default::default());
        assert_eq!(view.ships.len(), 1);
        assert_eq!(view.my_ships.len(), 1);
    }

    #[test]
    fn teams_mode_reveals_teammate_ships() {
        let board = Board::new(10, vec![ship(1, Some(1)), ship(2, Some(1)), ship(3, Some(2))]);
        let view = project(&board, 1, MatchMode::Teams, &Default::default());
        assert_eq!(view.ships.len(), 2);
    }
}
