use battleship_core_common::board::Board;
use battleship_core_common::UserId;

use crate::persistence::models::MatchPlayer;

/// `HasShipsAlive` of §4.3.
pub fn has_ships_alive(board: &Board, user_id: UserId) -> bool {
    board.has_ships_alive(user_id)
}

/// `NextUserId` of §4.3: rotates to the next user in `alive_order` after `current`. If
/// `current` isn't present (or the roster is empty), returns `current` unchanged rather
/// than panicking — a defensive no-op the caller can detect by comparing the result.
pub fn next_user_id(alive_order: &[UserId], current: UserId) -> UserId {
    match alive_order.iter().position(|&u| u == current) {
        Some(idx) if !alive_order.is_empty() => alive_order[(idx + 1) % alive_order.len()],
        _ => current,
    }
}

pub fn is_last_one(alive_order: &[UserId]) -> bool {
    alive_order.len() == 1
}

/// `SingleAliveTeam` of §4.3: the unique team shared by every still-active player, or
/// `None` if zero or more than one team remains.
pub fn single_alive_team(players: &[MatchPlayer]) -> Option<i32> {
    let mut teams = players.iter().filter(|p| p.is_active()).filter_map(|p| p.team);
    let first = teams.next()?;
    if teams.all(|t| t == first) {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(user_id: UserId, team: Option<i32>, left: bool) -> MatchPlayer {
        MatchPlayer {
            id: uuid::Uuid::new_v4(),
            match_id: uuid::Uuid::new_v4(),
            user_id,
            team,
            is_winner: false,
            left_at: if left { Some(chrono::Utc::now()) } else { None },
            joined_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn next_user_rotates_and_wraps() {
        let order = vec![1, 2, 3];
        assert_eq!(next_user_id(&order, 1), 2);
        assert_eq!(next_user_id(&order, 3), 1);
    }

    #[test]
    fn next_user_defensive_when_current_absent() {
        assert_eq!(next_user_id(&[1, 2], 99), 99);
        assert_eq!(next_user_id(&[], 5), 5);
    }

    #[test]
    fn single_alive_team_detects_convergence() {
        let players = vec![player(1, Some(1), false), player(2, Some(1), false), player(3, Some(2), true)];
        assert_eq!(single_alive_team(&players), Some(1));
    }

    #[test]
    fn single_alive_team_none_when_mixed() {
        let players = vec![player(1, Some(1), false), player(2, Some(2), false)];
        assert_eq!(single_alive_team(&players), None);
    }
}
