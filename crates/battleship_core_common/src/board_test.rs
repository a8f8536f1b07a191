use super::board::*;
use crate::UserId;
use uuid::Uuid;

fn ship(owner: UserId, cells: &[(u8, u8)]) -> Ship {
    Ship {
        ship_id: Uuid::new_v4(),
        owner_id: owner,
        team_id: None,
        positions: cells.iter().map(|&(r, c)| Position::new(r, c)).collect(),
        is_sunk: false,
    }
}

#[test]
fn register_hit_sinks_only_when_all_cells_hit() {
    let mut s = ship(1, &[(0, 0), (0, 1)]);
    assert!(!s.register_hit(0, 0));
    assert!(!s.is_sunk);
    assert!(s.register_hit(0, 1));
    assert!(s.is_sunk);
}

#[test]
fn register_hit_on_already_hit_cell_is_noop() {
    let mut s = ship(1, &[(0, 0)]);
    assert!(s.register_hit(0, 0));
    assert!(!s.register_hit(0, 0));
}

#[test]
fn board_has_ships_alive_false_once_all_sunk() {
    let mut b = Board::new(10, vec![ship(1, &[(0, 0)])]);
    assert!(b.has_ships_alive(1));
    b.ships[0].register_hit(0, 0);
    assert!(!b.has_ships_alive(1));
}

#[test]
fn board_bounds_and_duplicate_shot_detection() {
    let b = Board::new(10, vec![]);
    assert!(b.in_bounds(9, 9));
    assert!(!b.in_bounds(10, 0));
    assert!(!b.already_shot(0, 0));
}
