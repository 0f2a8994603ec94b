use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::*;

/// Lifecycle of a session.
///
/// Valid transitions:
/// - AwaitingFirstMove -> InProgress (first reveal places the mines)
/// - InProgress -> Won
/// - InProgress -> Lost
/// - any -> AwaitingFirstMove (reset)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingFirstMove,
    InProgress,
    Won,
    Lost,
}

impl Phase {
    /// Mines are not placed yet.
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::AwaitingFirstMove)
    }

    /// The game ended and no further moves are accepted.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::AwaitingFirstMove
    }
}

/// A game from start to finish: one board plus the phase machine that defers
/// mine placement to the first reveal, so the first click never detonates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    board: Board,
    phase: Phase,
    seed: u64,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Result<Self> {
        Self::with_seed(config, rand::rng().random())
    }

    /// Deterministic session: the same seed and first move produce the same
    /// mine layout.
    pub fn with_seed(config: GameConfig, seed: u64) -> Result<Self> {
        Ok(Self {
            board: Board::new(config)?,
            phase: Phase::default(),
            seed,
        })
    }

    /// Wraps a board whose mines are already placed, entering `InProgress`
    /// directly and skipping the first-move deferral.
    pub fn with_board(board: Board) -> Self {
        debug_assert!(board.is_placed(), "preset boards must have mines placed");
        Self {
            board,
            phase: Phase::InProgress,
            seed: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> GameConfig {
        self.board.config()
    }

    pub fn cell_at(&self, coords: Coord2) -> Result<Cell> {
        let coords = self.board.validate_coords(coords)?;
        Ok(self.board.cell(coords))
    }

    /// How many mines have not been flagged yet.
    pub fn mines_left(&self) -> isize {
        self.board.mines_left()
    }

    /// Every mine coordinate, for rendering the full board after a loss.
    pub fn mine_locations(&self) -> BTreeSet<Coord2> {
        self.board.mine_coords()
    }

    /// Reveals a cell. The first reveal of a session places the mines with
    /// the clicked cell kept clear, then opens it. Terminal phases answer
    /// with a no-op.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealUpdate> {
        let coords = self.board.validate_coords(coords)?;

        if self.phase.is_final() {
            return Ok(RevealUpdate::no_op());
        }

        if self.phase.is_initial() {
            if self.board.cell(coords).is_covered() {
                return Ok(RevealUpdate::no_op());
            }
            self.start(coords);
        }

        let update = self.board.reveal(coords)?;
        self.settle(&update);
        Ok(update)
    }

    /// Chord on an open numbered cell whose flags match its count, opening
    /// the remaining neighbors in one move.
    pub fn chord_reveal(&mut self, coords: Coord2) -> Result<RevealUpdate> {
        let coords = self.board.validate_coords(coords)?;

        if !matches!(self.phase, Phase::InProgress) {
            return Ok(RevealUpdate::no_op());
        }

        let update = self.board.chord_reveal(coords)?;
        self.settle(&update);
        Ok(update)
    }

    /// Toggles a flag. The completion check runs after flag toggles as well:
    /// covering the last cell with a flag finishes the game.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        let coords = self.board.validate_coords(coords)?;

        if self.phase.is_final() {
            return Ok(FlagOutcome::NoOp);
        }

        let outcome = self.board.toggle_flag(coords)?;
        if matches!(self.phase, Phase::InProgress) && self.board.is_won() {
            self.finish(Phase::Won);
        }
        Ok(outcome)
    }

    /// Discards the board and starts over with a new configuration and a
    /// fresh placement seed. The old board survives if the configuration is
    /// invalid.
    pub fn reset(&mut self, config: GameConfig) -> Result<()> {
        self.board = Board::new(config)?;
        self.phase = Phase::AwaitingFirstMove;
        self.seed = rand::rng().random();
        log::debug!("Session reset to {:?}", config);
        Ok(())
    }

    /// First-move hook: places mines with the clicked cell kept clear.
    fn start(&mut self, first_move: Coord2) {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        self.board.place_mines(&mut rng, first_move);
        self.board.compute_adjacency();
        self.phase = Phase::InProgress;
        log::debug!("First move at {:?}, session in progress", first_move);
    }

    fn settle(&mut self, update: &RevealUpdate) {
        match update.outcome {
            RevealOutcome::Detonated => self.finish(Phase::Lost),
            RevealOutcome::OpenedEmpty | RevealOutcome::OpenedNumbered(_) => {
                if self.board.is_won() {
                    self.finish(Phase::Won);
                }
            }
            RevealOutcome::NoOp => {}
        }
    }

    fn finish(&mut self, phase: Phase) {
        self.phase = phase;
        log::debug!("Game over: {:?}", phase);
    }
}
