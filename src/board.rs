//! What the bot knows about the opponent's grid, rebuilt from the server's
//! snapshot on every attack. Pure functions, no I/O.

use std::collections::HashSet;

use serde::Serialize;

use crate::common::{CellState, GridCell, TargetError};
use crate::domain::{AttackRecord, OpponentInfo};
use crate::ship::ShipType;

/// Square matrix of [`CellState`], indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoardState(Vec<Vec<CellState>>);

impl BoardState {
    /// A board on which nothing has been played.
    pub fn new(grid_size: u8) -> Self {
        let n = grid_size as usize;
        Self(vec![vec![CellState::NotPlayed; n]; n])
    }

    /// Replay this player's attacks, oldest first, onto an empty board.
    ///
    /// Results outside the grid are skipped. A later result for the same cell
    /// overwrites an earlier one.
    pub fn from_attacks(grid_size: u8, attacks: &[AttackRecord]) -> Self {
        let mut board = Self::new(grid_size);
        for outcome in attacks.iter().flat_map(|record| record.results.iter()) {
            let state = if outcome.hit {
                CellState::Hit
            } else {
                CellState::Miss
            };
            board.set(outcome.origin, state);
        }
        board
    }

    pub fn grid_size(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, cell: GridCell) -> Option<CellState> {
        self.0
            .get(cell.y as usize)
            .and_then(|row| row.get(cell.x as usize))
            .copied()
    }

    fn set(&mut self, cell: GridCell, state: CellState) {
        if let Some(slot) = self
            .0
            .get_mut(cell.y as usize)
            .and_then(|row| row.get_mut(cell.x as usize))
        {
            *slot = state;
        }
    }

    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.0
    }
}

/// An opponent ship revealed as sunk, with the cells it occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyedShip {
    #[serde(rename = "type")]
    pub ship_type: ShipType,
    pub cells: Vec<GridCell>,
}

/// Ships the server has revealed on the opponent's board.
pub fn destroyed_ships(opponent: &OpponentInfo) -> Vec<DestroyedShip> {
    opponent
        .board
        .values()
        .map(|ship| DestroyedShip {
            ship_type: ship.ship_type,
            cells: ship.cells.iter().map(|cell| cell.origin).collect(),
        })
        .collect()
}

/// Every cell this player has already targeted.
pub fn attacked_cells(attacks: &[AttackRecord]) -> HashSet<GridCell> {
    attacks
        .iter()
        .flat_map(|record| {
            core::iter::once(record.attack.origin).chain(record.results.iter().map(|r| r.origin))
        })
        .collect()
}

/// Deterministic target used when no prediction is available: the smallest
/// `(x, y)` in lexicographic order that has not been attacked.
pub fn fallback_target(grid_size: u8, attacks: &[AttackRecord]) -> Result<GridCell, TargetError> {
    let attacked = attacked_cells(attacks);
    (0..grid_size)
        .flat_map(|x| (0..grid_size).map(move |y| GridCell::new(x, y)))
        .find(|cell| !attacked.contains(cell))
        .ok_or(TargetError::NoAvailableTarget)
}
