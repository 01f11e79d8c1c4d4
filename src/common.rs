//! Common types for the bot: grid cells, cell states and targeting errors.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A cell on the grid, carried on the wire as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 2]", into = "[u8; 2]")]
pub struct GridCell {
    pub x: u8,
    pub y: u8,
}

impl GridCell {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Whether the cell lies on a `grid_size` × `grid_size` board.
    pub fn in_bounds(&self, grid_size: u8) -> bool {
        self.x < grid_size && self.y < grid_size
    }
}

impl From<[u8; 2]> for GridCell {
    fn from([x, y]: [u8; 2]) -> Self {
        Self { x, y }
    }
}

impl From<GridCell> for [u8; 2] {
    fn from(cell: GridCell) -> Self {
        [cell.x, cell.y]
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// What this player knows about a cell of the opponent's grid.
///
/// Encoded as the integers the prediction service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    NotPlayed,
    Miss,
    Hit,
}

impl CellState {
    pub const fn code(self) -> i8 {
        match self {
            CellState::NotPlayed => -1,
            CellState::Miss => 1,
            CellState::Hit => 2,
        }
    }
}

impl Serialize for CellState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

/// Errors raised while choosing a target without the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// Every cell of the grid has already been attacked.
    #[error("no unattacked cell left on the grid")]
    NoAvailableTarget,
}
