use battleship_core_common::board::{Board, Orientation, Position, Ship};
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::UserId;
use rand::Rng;

use crate::persistence::models::{Difficulty, MatchMode};

struct SizingRow {
    base_size: f64,
    per_player_increment: f64,
    occupancy_cap: f64,
}

fn sizing_row(difficulty: Difficulty) -> SizingRow {
    match difficulty {
        Difficulty::Easy => SizingRow { base_size: 10.0, per_player_increment: 1.0, occupancy_cap: 0.70 },
        Difficulty::Medium => SizingRow { base_size: 12.0, per_player_increment: 1.5, occupancy_cap: 0.55 },
        Difficulty::Hard => SizingRow { base_size: 14.0, per_player_increment: 2.0, occupancy_cap: 0.35 },
    }
}

fn ships_per_player(difficulty: Difficulty) -> &'static [u8] {
    match difficulty {
        Difficulty::Easy => &[5, 4, 3, 2, 2, 1, 1],
        Difficulty::Medium => &[4, 4, 3, 3, 2, 2, 1],
        Difficulty::Hard => &[4, 3, 2, 2, 1],
    }
}

/// Computes the board side length for a roster, per §4.2's sizing table.
pub fn compute_size(player_count: usize, difficulty: Difficulty, _mode: MatchMode, max_board_size: u8) -> u8 {
    let row = sizing_row(difficulty);
    let raw = row.base_size + player_count as f64 * row.per_player_increment;
    (raw.ceil() as u8).min(max_board_size)
}

fn occupancy_cap(difficulty: Difficulty, mode: MatchMode) -> f64 {
    let mut cap = sizing_row(difficulty).occupancy_cap;
    if mode == MatchMode::Teams {
        cap += 0.05;
    }
    cap
}

fn check_capacity(size: u8, player_count: usize, difficulty: Difficulty, mode: MatchMode) -> CoreResult<()> {
    let sizes = ships_per_player(difficulty);
    let avg_ship_size: f64 = sizes.iter().map(|&s| s as f64).sum::<f64>() / sizes.len() as f64;
    let needed = player_count as f64 * avg_ship_size * sizes.len() as f64;
    let capacity = (size as f64 * size as f64 * occupancy_cap(difficulty, mode)).floor();
    if needed > capacity {
        return Err(CoreError::validation(format!(
            "board capacity exceeded: need ~{needed} cells, cap is {capacity} (size={size})"
        )));
    }
    Ok(())
}

/// Generates the initial board for a roster, per §4.2. Takes its RNG as a parameter so
/// tests can supply a seeded, reproducible source while production passes the process's
/// default generator.
pub fn generate_board(
    player_ids: &[UserId],
    difficulty: Difficulty,
    mode: MatchMode,
    max_board_size: u8,
    max_attempts: u32,
    rng: &mut impl Rng,
) -> CoreResult<Board> {
    let size = compute_size(player_ids.len(), difficulty, mode, max_board_size);
    check_capacity(size, player_ids.len(), difficulty, mode)?;

    let sizes = ships_per_player(difficulty);
    let mut ships: Vec<Ship> = Vec::with_capacity(player_ids.len() * sizes.len());

    for &owner_id in player_ids {
        for &ship_len in sizes {
            let mut placed = false;
            for _ in 0..max_attempts {
                let orientation = if rng.gen_bool(0.5) { Orientation::Horizontal } else { Orientation::Vertical };
                let (max_row, max_col) = match orientation {
                    Orientation::Horizontal => (size, size.saturating_sub(ship_len - 1)),
                    Orientation::Vertical => (size.saturating_sub(ship_len - 1), size),
                };
                if max_row == 0 || max_col == 0 {
                    continue;
                }
                let origin_row = rng.gen_range(0..max_row);
                let origin_col = rng.gen_range(0..max_col);
                let positions: Vec<Position> = (0..ship_len)
                    .map(|i| match orientation {
                        Orientation::Horizontal => Position::new(origin_row, origin_col + i),
                        Orientation::Vertical => Position::new(origin_row + i, origin_col),
                    })
                    .collect();

                let collides = positions.iter().any(|p| ships.iter().any(|s| s.occupies(p.row, p.col)));
                if collides {
                    continue;
                }

                ships.push(Ship { ship_id: uuid::Uuid::new_v4(), owner_id, team_id: None, positions, is_sunk: false });
                placed = true;
                break;
            }
            if !placed {
                return Err(CoreError::validation(format!(
                    "unable to place a ship of length {ship_len} for player {owner_id} after {max_attempts} attempts"
                )));
            }
        }
    }

    Ok(Board::new(size, ships))
}

/// Stamps each ship's `team_id` from the ephemeral team map, per §4.2 "Team tagging".
pub fn apply_team_tags(board: &mut Board, team_of: impl Fn(UserId) -> Option<i32>) {
    for ship in board.ships.iter_mut() {
        ship.team_id = team_of(ship.owner_id);
    }
}
