use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::board_gen::*;
use crate::persistence::models::{Difficulty, MatchMode};

#[test]
fn size_grows_with_player_count_and_caps_at_max() {
    assert_eq!(compute_size(2, Difficulty::Easy, MatchMode::Individual, 20), 12);
    assert_eq!(compute_size(100, Difficulty::Easy, MatchMode::Individual, 20), 20);
}

#[test]
fn generated_board_has_no_overlapping_ships() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let board = generate_board(&[1, 2], Difficulty::Easy, MatchMode::Individual, 20, 100, &mut rng).unwrap();
    let mut seen = std::collections::HashSet::new();
    for ship in &board.ships {
        for p in &ship.positions {
            assert!(seen.insert((p.row, p.col)), "duplicate cell at {:?}", (p.row, p.col));
            assert!(board.in_bounds(p.row, p.col));
        }
    }
    assert_eq!(board.ships.iter().filter(|s| s.owner_id == 1).count(), 7);
}

#[test]
fn capacity_exceeded_fails_before_placement() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let err = generate_board(&(1..=50).collect::<Vec<_>>(), Difficulty::Hard, MatchMode::Teams, 20, 100, &mut rng).unwrap_err();
    assert!(matches!(err, battleship_core_common::error::CoreError::ValidationRejection(_)));
}
