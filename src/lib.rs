use core::ops::BitOr;
use serde::{Deserialize, Serialize};

pub use board::*;
pub use cell::*;
pub use error::*;
pub use session::*;
pub use types::*;

mod board;
mod cell;
mod error;
mod session;
mod types;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub rows: Coord,
    pub cols: Coord,
    pub mines: CellCount,
}

impl GameConfig {
    pub fn new(rows: Coord, cols: Coord, mines: CellCount) -> Result<Self> {
        let config = Self { rows, cols, mines };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(GameError::InvalidDimensions);
        }
        if self.mines == 0 || self.mines >= self.total_cells() {
            return Err(GameError::InvalidMineCount);
        }
        Ok(())
    }

    pub const fn total_cells(&self) -> CellCount {
        area(self.rows, self.cols)
    }
}

/// Outcome of a flag toggle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlagOutcome {
    NoOp,
    Flagged,
    Unflagged,
}

impl FlagOutcome {
    /// Whether this outcome changed the board.
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Outcome of revealing a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    NoOp,
    OpenedNumbered(u8),
    OpenedEmpty,
    Detonated,
}

impl RevealOutcome {
    /// Whether this outcome changed the board.
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Used to merge outcomes when a chord reveals several neighbors.
impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            // detonation has priority
            (Detonated, _) => Detonated,
            (_, Detonated) => Detonated,
            // then a cascade
            (OpenedEmpty, _) => OpenedEmpty,
            (_, OpenedEmpty) => OpenedEmpty,
            // then the first numbered open
            (OpenedNumbered(count), _) => OpenedNumbered(count),
            (_, OpenedNumbered(count)) => OpenedNumbered(count),
            (NoOp, NoOp) => NoOp,
        }
    }
}

/// Result of a reveal call: the merged outcome plus every cell whose open
/// state changed, so renderers can repaint cascades incrementally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealUpdate {
    pub outcome: RevealOutcome,
    pub opened: Vec<Coord2>,
}

impl RevealUpdate {
    pub(crate) fn no_op() -> Self {
        Self {
            outcome: RevealOutcome::NoOp,
            opened: Vec::new(),
        }
    }

    pub fn has_update(&self) -> bool {
        self.outcome.has_update()
    }
}
