use serde::{Deserialize, Serialize};

/// State of a single board cell. Mutated only by the owning [`Board`](crate::Board).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub(crate) is_mine: bool,
    pub(crate) is_open: bool,
    pub(crate) is_flagged: bool,
    pub(crate) adjacent_mines: u8,
}

impl Cell {
    pub const fn is_mine(self) -> bool {
        self.is_mine
    }

    pub const fn is_open(self) -> bool {
        self.is_open
    }

    pub const fn is_flagged(self) -> bool {
        self.is_flagged
    }

    /// Mines in the 8-neighborhood. Meaningful only once mines are placed.
    pub const fn adjacent_mines(self) -> u8 {
        self.adjacent_mines
    }

    /// Whether the cell counts toward board completion, either revealed or flagged.
    pub const fn is_covered(self) -> bool {
        self.is_open || self.is_flagged
    }
}
