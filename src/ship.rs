//! Ship definitions and the layout the bot submits for its own board.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::common::GridCell;

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// The fleet every player places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShipType {
    Carrier,
    Battleship,
    Destroyer,
    Submarine,
}

impl ShipType {
    pub const ALL: [ShipType; 4] = [
        ShipType::Carrier,
        ShipType::Battleship,
        ShipType::Destroyer,
        ShipType::Submarine,
    ];

    /// Number of cells the ship occupies.
    pub const fn length(self) -> u8 {
        match self {
            ShipType::Carrier => 5,
            ShipType::Battleship => 4,
            ShipType::Destroyer => 2,
            ShipType::Submarine => 3,
        }
    }
}

/// Where a single ship sits: its origin cell and the direction it extends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub origin: GridCell,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub const fn new(x: u8, y: u8, orientation: Orientation) -> Self {
        Self {
            origin: GridCell::new(x, y),
            orientation,
        }
    }

    /// Cells covered by a ship of `ship` type placed here. Cells that would
    /// fall past `u8::MAX` are omitted, so callers must bounds-check the count.
    pub fn cells(&self, ship: ShipType) -> Vec<GridCell> {
        (0..ship.length())
            .filter_map(|k| {
                let (dx, dy) = match self.orientation {
                    Orientation::Horizontal => (k, 0),
                    Orientation::Vertical => (0, k),
                };
                Some(GridCell::new(
                    self.origin.x.checked_add(dx)?,
                    self.origin.y.checked_add(dy)?,
                ))
            })
            .collect()
    }
}

/// Reasons a layout cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout is missing the {0:?}")]
    MissingShip(ShipType),
    #[error("{0:?} does not fit on a {1}x{1} grid")]
    OutOfBounds(ShipType, u8),
    #[error("{0:?} overlaps another ship at {1}")]
    Overlaps(ShipType, GridCell),
}

/// Ship type → placement, serialized as the `ship-positions` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipLayout(BTreeMap<ShipType, ShipPlacement>);

impl ShipLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// The layout sent when the server did not suggest one.
    ///
    /// One ship per row, all horizontal from the left edge, which fits any
    /// grid at least as wide as the carrier.
    pub fn fallback() -> Self {
        let mut layout = Self::new();
        layout.insert(ShipType::Carrier, ShipPlacement::new(0, 0, Orientation::Horizontal));
        layout.insert(ShipType::Battleship, ShipPlacement::new(0, 1, Orientation::Horizontal));
        layout.insert(ShipType::Submarine, ShipPlacement::new(0, 2, Orientation::Horizontal));
        layout.insert(ShipType::Destroyer, ShipPlacement::new(0, 3, Orientation::Horizontal));
        layout
    }

    pub fn insert(&mut self, ship: ShipType, placement: ShipPlacement) -> Option<ShipPlacement> {
        self.0.insert(ship, placement)
    }

    pub fn get(&self, ship: ShipType) -> Option<&ShipPlacement> {
        self.0.get(&ship)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShipType, &ShipPlacement)> {
        self.0.iter().map(|(ship, placement)| (*ship, placement))
    }

    /// Check that every ship is present, on the grid, and alone on its cells.
    pub fn validate(&self, grid_size: u8) -> Result<(), LayoutError> {
        let mut occupied = HashSet::new();
        for ship in ShipType::ALL {
            let placement = self.get(ship).ok_or(LayoutError::MissingShip(ship))?;
            let cells = placement.cells(ship);
            if cells.len() != ship.length() as usize
                || cells.iter().any(|cell| !cell.in_bounds(grid_size))
            {
                return Err(LayoutError::OutOfBounds(ship, grid_size));
            }
            for cell in cells {
                if !occupied.insert(cell) {
                    return Err(LayoutError::Overlaps(ship, cell));
                }
            }
        }
        Ok(())
    }
}
