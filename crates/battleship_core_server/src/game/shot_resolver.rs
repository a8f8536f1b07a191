use battleship_core_common::board::{Board, ShotRecord, ShotType};
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::{ShipId, UserId};

pub struct ResolvedShot {
    pub hit: bool,
    pub sunk_ship_id: Option<ShipId>,
    pub records: Vec<ShotRecord>,
}

/// Expands a shot's center into the bounded, deduplicated, in-bounds cell list for its
/// type, per §4.4.1.
fn expand_pattern(board: &Board, shot_type: ShotType, center: (u8, u8), extra_targets: &[(u8, u8)]) -> Vec<(u8, u8)> {
    let size = board.size as i32;
    let in_bounds = |r: i32, c: i32| r >= 0 && r < size && c >= 0 && c < size;
    let (cr, cc) = (center.0 as i32, center.1 as i32);

    let mut cells: Vec<(u8, u8)> = match shot_type {
        ShotType::Simple => vec![center],
        ShotType::Cross => [(cr, cc), (cr - 1, cc), (cr + 1, cc), (cr, cc - 1), (cr, cc + 1)]
            .into_iter()
            .filter(|&(r, c)| in_bounds(r, c))
            .map(|(r, c)| (r as u8, c as u8))
            .collect(),
        ShotType::Area | ShotType::Scan => {
            let mut v = Vec::with_capacity(9);
            for dr in -1..=1 {
                for dc in -1..=1 {
                    let (r, c) = (cr + dr, cc + dc);
                    if in_bounds(r, c) {
                        v.push((r as u8, c as u8));
                    }
                }
            }
            v
        }
        ShotType::Multi => {
            let mut v = vec![center];
            v.extend(extra_targets.iter().copied());
            v
        }
        ShotType::Nuclear => {
            let mut v = Vec::with_capacity(2 * board.size as usize - 1);
            for c in 0..board.size {
                v.push((center.0, c));
            }
            for r in 0..board.size {
                if r != center.0 {
                    v.push((r, center.1));
                }
            }
            v
        }
    };

    let mut seen = std::collections::HashSet::new();
    cells.retain(|cell| seen.insert(*cell));
    cells
}

/// Resolves one `PLAYER_FIRE` shot against a board, per §4.4/§4.4.1. The caller is
/// responsible for checking turn ownership and nuclear eligibility before calling this;
/// this function only enforces bounds and no-double-shot-on-the-center.
pub fn resolve_shot(
    board: &mut Board,
    shooter_id: UserId,
    shot_type: ShotType,
    target: (u8, u8),
    extra_targets: &[(u8, u8)],
) -> CoreResult<ResolvedShot> {
    if !board.in_bounds(target.0, target.1) {
        return Err(CoreError::validation(format!("target {target:?} is out of bounds")));
    }
    if board.already_shot(target.0, target.1) {
        return Err(CoreError::validation(format!("target {target:?} was already shot")));
    }

    let cells = expand_pattern(board, shot_type, target, extra_targets);
    let mut any_hit = false;
    let mut sunk_ship_id = None;
    let mut records = Vec::with_capacity(cells.len());

    for (row, col) in cells {
        let is_scan = shot_type == ShotType::Scan;
        let hit_here = if is_scan {
            board.ships.iter().any(|s| s.occupies(row, col))
        } else if let Some(ship) = board.ship_at_mut(row, col) {
            let sank = ship.register_hit(row, col);
            if sank {
                sunk_ship_id = Some(ship.ship_id);
            }
            true
        } else {
            false
        };

        any_hit |= hit_here;
        records.push(ShotRecord {
            id: uuid::Uuid::new_v4(),
            shooter_id,
            shot_type,
            target: (row, col),
            hit: hit_here,
            sunk_ship_id: if is_scan { None } else { sunk_ship_id },
            created_at: chrono::Utc::now(),
        });
    }

    board.shots.extend(records.clone());

    Ok(ResolvedShot { hit: any_hit, sunk_ship_id, records })
}

#[cfg(test)]
mod inline_tests {
    use super::*;
    use battleship_core_common::board::{Position, Ship};

    fn board_with_ship(len: u8) -> Board {
        let positions = (0..len).map(|c| Position::new(0, c)).collect();
        Board::new(10, vec![Ship { ship_id: uuid::Uuid::new_v4(), owner_id: 1, team_id: None, positions, is_sunk: false }])
    }

    #[test]
    fn simple_hit_sinks_when_last_cell_hit() {
        let mut board = board_with_ship(1);
        let resolved = resolve_shot(&mut board, 2, ShotType::Simple, (0, 0), &[]).unwrap();
        assert!(resolved.hit);
        assert!(resolved.sunk_ship_id.is_some());
    }

    #[test]
    fn double_shot_on_same_cell_rejected() {
        let mut board = board_with_ship(2);
        resolve_shot(&mut board, 2, ShotType::Simple, (0, 0), &[]).unwrap();
        let err = resolve_shot(&mut board, 2, ShotType::Simple, (0, 0), &[]).unwrap_err();
        assert!(matches!(err, CoreError::ValidationRejection(_)));
    }

    #[test]
    fn out_of_range_rejected() {
        let mut board = board_with_ship(1);
        let err = resolve_shot(&mut board, 2, ShotType::Simple, (10, 0), &[]).unwrap_err();
        assert!(matches!(err, CoreError::ValidationRejection(_)));
    }

    #[test]
    fn cross_pattern_clips_at_board_edge() {
        let mut board = board_with_ship(1);
        let resolved = resolve_shot(&mut board, 2, ShotType::Cross, (0, 0), &[]).unwrap();
        assert_eq!(resolved.records.len(), 3); // center, right, down — up and left are off-board
    }

    #[test]
    fn scan_reveals_without_marking_hit() {
        let mut board = board_with_ship(1);
        let resolved = resolve_shot(&mut board, 2, ShotType::Scan, (0, 0), &[]).unwrap();
        assert!(resolved.hit);
        assert!(!board.ships[0].is_sunk);
        assert!(!board.ships[0].positions[0].is_hit);
    }

    #[test]
    fn nuclear_spans_row_and_column() {
        let mut board = board_with_ship(1);
        let resolved = resolve_shot(&mut board, 2, ShotType::Nuclear, (0, 0), &[]).unwrap();
        assert_eq!(resolved.records.len(), 2 * board.size as usize - 1);
    }
}
