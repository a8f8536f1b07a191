use serde::{Deserialize, Serialize};

use crate::{ShipId, UserId};

/// A single cell of a [`Ship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
    pub is_hit: bool,
}

impl Position {
    pub fn new(row: u8, col: u8) -> Self {
        Position { row, col, is_hit: false }
    }

    pub fn coords(&self) -> (u8, u8) {
        (self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub ship_id: ShipId,
    pub owner_id: UserId,
    pub team_id: Option<i32>,
    pub positions: Vec<Position>,
    pub is_sunk: bool,
}

impl Ship {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn occupies(&self, row: u8, col: u8) -> bool {
        self.positions.iter().any(|p| p.row == row && p.col == col)
    }

    /// Marks the cell hit and recomputes `is_sunk`. Returns true if this call sank the ship.
    pub fn register_hit(&mut self, row: u8, col: u8) -> bool {
        let mut hit = false;
        for p in self.positions.iter_mut() {
            if p.row == row && p.col == col && !p.is_hit {
                p.is_hit = true;
                hit = true;
            }
        }
        if hit && !self.is_sunk && self.positions.iter().all(|p| p.is_hit) {
            self.is_sunk = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    Simple,
    Cross,
    Multi,
    Area,
    Scan,
    Nuclear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotRecord {
    pub id: uuid::Uuid,
    pub shooter_id: UserId,
    #[serde(rename = "type")]
    pub shot_type: ShotType,
    pub target: (u8, u8),
    pub hit: bool,
    pub sunk_ship_id: Option<ShipId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The full, server-authoritative board state for one match. Persisted as a single JSON
/// column per §6.4 — small enough (bounded by 20x20 cells, at most a few dozen ships)
/// that a normalized per-ship schema would not earn its keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub size: u8,
    pub ships: Vec<Ship>,
    pub shots: Vec<ShotRecord>,
}

impl Board {
    pub fn new(size: u8, ships: Vec<Ship>) -> Self {
        Board { size, ships, shots: Vec::new() }
    }

    pub fn in_bounds(&self, row: u8, col: u8) -> bool {
        (row as usize) < self.size as usize && (col as usize) < self.size as usize
    }

    pub fn already_shot(&self, row: u8, col: u8) -> bool {
        self.shots.iter().any(|s| s.target == (row, col))
    }

    pub fn ships_owned_by(&self, user_id: UserId) -> impl Iterator<Item = &Ship> {
        self.ships.iter().filter(move |s| s.owner_id == user_id)
    }

    pub fn has_ships_alive(&self, user_id: UserId) -> bool {
        self.ships_owned_by(user_id).any(|s| !s.is_sunk)
    }

    pub fn ship_at_mut(&mut self, row: u8, col: u8) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| !s.is_sunk && s.occupies(row, col))
    }
}
