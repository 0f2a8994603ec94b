use ndarray::Array2;
use rand::{Rng, RngExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::*;

/// Owns the cell grid and implements mine placement, adjacency counting,
/// reveal with cascade, flag toggling, and completion detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    cells: Array2<Cell>,
    mine_count: CellCount,
    placed: bool,
    open_count: CellCount,
    flag_count: CellCount,
}

impl Board {
    /// Empty board with no mines placed yet; the session places them on the
    /// first reveal.
    pub(crate) fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cells: Array2::default((config.rows, config.cols).to_index()),
            mine_count: config.mines,
            placed: false,
            open_count: 0,
            flag_count: 0,
        })
    }

    /// Board with a predetermined mine layout, for replays and tests.
    /// Duplicate coordinates collapse; adjacency is computed eagerly.
    pub fn with_mines(rows: Coord, cols: Coord, mines: &[Coord2]) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GameError::InvalidDimensions);
        }

        let mut cells: Array2<Cell> = Array2::default((rows, cols).to_index());
        let mut mine_count: CellCount = 0;
        for &coords in mines {
            if coords.0 >= rows || coords.1 >= cols {
                return Err(GameError::OutOfBounds);
            }
            let cell = &mut cells[coords.to_index()];
            if !cell.is_mine {
                cell.is_mine = true;
                mine_count += 1;
            }
        }
        if mine_count == 0 || mine_count >= area(rows, cols) {
            return Err(GameError::InvalidMineCount);
        }

        let mut board = Self {
            cells,
            mine_count,
            placed: true,
            open_count: 0,
            flag_count: 0,
        };
        board.compute_adjacency();
        Ok(board)
    }

    pub fn rows(&self) -> Coord {
        self.cells.dim().0.try_into().unwrap()
    }

    pub fn cols(&self) -> Coord {
        self.cells.dim().1.try_into().unwrap()
    }

    pub fn size(&self) -> Coord2 {
        (self.rows(), self.cols())
    }

    pub fn total_cells(&self) -> CellCount {
        self.cells.len().try_into().unwrap()
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    /// How many mines have not been flagged yet.
    pub fn mines_left(&self) -> isize {
        (self.mine_count as isize) - (self.flag_count as isize)
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn config(&self) -> GameConfig {
        GameConfig {
            rows: self.rows(),
            cols: self.cols(),
            mines: self.mine_count,
        }
    }

    pub fn cell(&self, coords: Coord2) -> Cell {
        self.cells[coords.to_index()]
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let (rows, cols) = self.size();
        if coords.0 < rows && coords.1 < cols {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    /// Every mine coordinate, for rendering after a loss. Pure read; empty
    /// until mines are placed.
    pub fn mine_coords(&self) -> BTreeSet<Coord2> {
        self.cells
            .indexed_iter()
            .filter(|(_, cell)| cell.is_mine)
            .map(|((row, col), _)| (row.try_into().unwrap(), col.try_into().unwrap()))
            .collect()
    }

    /// Scatters `mine_count` mines by rejection sampling, never on `excluded`.
    /// Runs exactly once per board lifetime, before [`Self::compute_adjacency`].
    pub(crate) fn place_mines<R: Rng + ?Sized>(&mut self, rng: &mut R, excluded: Coord2) {
        debug_assert!(!self.placed, "mines are placed once per board");

        let mut placed: CellCount = 0;
        let mut draws: u32 = 0;
        while placed < self.mine_count {
            let coords = (
                rng.random_range(0..self.rows()),
                rng.random_range(0..self.cols()),
            );
            draws += 1;
            if coords == excluded || self.cells[coords.to_index()].is_mine {
                continue;
            }
            self.cells[coords.to_index()].is_mine = true;
            placed += 1;
        }
        self.placed = true;
        log::debug!(
            "Placed {} mines in {} draws, keeping {:?} clear",
            placed,
            draws,
            excluded
        );
    }

    /// Stores the mine count of every cell's bounds-clipped 8-neighborhood.
    pub(crate) fn compute_adjacency(&mut self) {
        debug_assert!(self.placed, "adjacency is computed after mine placement");

        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let count = self.count_adjacent_mines((row, col));
                self.cells[(row, col).to_index()].adjacent_mines = count;
            }
        }
    }

    /// Opens a closed, unflagged cell; an open or flagged target is a no-op.
    /// A zero-count cell starts a flood fill over its transitive zero-region.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealUpdate> {
        use RevealOutcome::*;

        let coords = self.validate_coords(coords)?;
        debug_assert!(self.placed, "mines must be placed before revealing");

        let cell = self.cells[coords.to_index()];
        if cell.is_covered() {
            return Ok(RevealUpdate::no_op());
        }

        self.open_cell(coords);
        let mut opened = vec![coords];

        if cell.is_mine {
            log::debug!("Mine detonated at {:?}", coords);
            return Ok(RevealUpdate {
                outcome: Detonated,
                opened,
            });
        }

        log::debug!(
            "Opened cell at {:?}, adjacent mines: {}",
            coords,
            cell.adjacent_mines
        );

        if cell.adjacent_mines > 0 {
            return Ok(RevealUpdate {
                outcome: OpenedNumbered(cell.adjacent_mines),
                opened,
            });
        }

        // A cell is opened before its neighbors are expanded, so cycles
        // through shared neighbors terminate.
        let mut visited = BTreeSet::from([coords]);
        let mut to_visit: VecDeque<_> = self
            .cells
            .iter_neighbors(coords)
            .filter(|&pos| !self.cells[pos.to_index()].is_covered())
            .collect();
        log::trace!(
            "Starting flood fill from {:?}, initial neighbors: {:?}",
            coords,
            to_visit
        );

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            // skip flagged or already opened cells
            let visit_cell = self.cells[visit_coords.to_index()];
            if visit_cell.is_covered() {
                log::trace!("Skipping cell at {:?}", visit_coords);
                continue;
            }

            self.open_cell(visit_coords);
            opened.push(visit_coords);
            log::trace!(
                "Flood opened cell at {:?}, adjacent mines: {}",
                visit_coords,
                visit_cell.adjacent_mines
            );

            // only a zero cell expands further
            if visit_cell.adjacent_mines == 0 {
                to_visit.extend(
                    self.cells
                        .iter_neighbors(visit_coords)
                        .filter(|&pos| !self.cells[pos.to_index()].is_covered())
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }

        Ok(RevealUpdate {
            outcome: OpenedEmpty,
            opened,
        })
    }

    /// Opens every closed, unflagged neighbor of an open numbered cell whose
    /// flagged-neighbor count matches its number; anything else is a no-op.
    pub fn chord_reveal(&mut self, coords: Coord2) -> Result<RevealUpdate> {
        let coords = self.validate_coords(coords)?;

        let cell = self.cells[coords.to_index()];
        if !cell.is_open || cell.is_mine || cell.adjacent_mines == 0 {
            return Ok(RevealUpdate::no_op());
        }
        if self.count_flagged_neighbors(coords) != cell.adjacent_mines {
            return Ok(RevealUpdate::no_op());
        }

        let mut outcome = RevealOutcome::NoOp;
        let mut opened = Vec::new();
        for neighbor_coords in self.cells.iter_neighbors(coords) {
            let update = self.reveal(neighbor_coords)?;
            outcome = outcome | update.outcome;
            opened.extend(update.opened);
        }
        Ok(RevealUpdate { outcome, opened })
    }

    /// Flags a closed cell or unflags a flagged one; open cells are a no-op.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<FlagOutcome> {
        use FlagOutcome::*;

        let coords = self.validate_coords(coords)?;

        let cell = &mut self.cells[coords.to_index()];
        Ok(if cell.is_open {
            NoOp
        } else if cell.is_flagged {
            cell.is_flagged = false;
            self.flag_count -= 1;
            Unflagged
        } else {
            cell.is_flagged = true;
            self.flag_count += 1;
            Flagged
        })
    }

    /// Whether every cell is accounted for, revealed or flagged.
    pub fn is_won(&self) -> bool {
        self.open_count + self.flag_count == self.total_cells()
    }

    fn open_cell(&mut self, coords: Coord2) {
        self.cells[coords.to_index()].is_open = true;
        self.open_count += 1;
    }

    fn count_adjacent_mines(&self, coords: Coord2) -> u8 {
        self.cells
            .iter_neighbors(coords)
            .filter(|&pos| self.cells[pos.to_index()].is_mine)
            .count()
            .try_into()
            .unwrap()
    }

    fn count_flagged_neighbors(&self, coords: Coord2) -> u8 {
        self.cells
            .iter_neighbors(coords)
            .filter(|&pos| self.cells[pos.to_index()].is_flagged)
            .count()
            .try_into()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn brute_force_count(board: &Board, row: i32, col: i32) -> u8 {
        let mut count = 0;
        for d_row in -1..=1 {
            for d_col in -1..=1 {
                if d_row == 0 && d_col == 0 {
                    continue;
                }
                let (r, c) = (row + d_row, col + d_col);
                if r >= 0
                    && r < i32::from(board.rows())
                    && c >= 0
                    && c < i32::from(board.cols())
                    && board.cell((r as Coord, c as Coord)).is_mine()
                {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn placement_is_exact_and_respects_exclusion() {
        for seed in 0..16 {
            let mut board = Board::new(GameConfig::new(9, 9, 10).unwrap()).unwrap();
            let mut rng = SmallRng::seed_from_u64(seed);
            board.place_mines(&mut rng, (4, 4));
            board.compute_adjacency();

            assert_eq!(board.mine_coords().len(), 10);
            assert!(!board.cell((4, 4)).is_mine());
            assert!(board.is_placed());
        }
    }

    #[test]
    fn placement_fills_everything_but_the_excluded_cell() {
        let mut board = Board::new(GameConfig::new(2, 2, 3).unwrap()).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        board.place_mines(&mut rng, (1, 1));
        board.compute_adjacency();

        let mines = board.mine_coords();
        assert_eq!(mines, BTreeSet::from([(0, 0), (0, 1), (1, 0)]));
        assert_eq!(board.cell((1, 1)).adjacent_mines(), 3);
    }

    #[test]
    fn adjacency_matches_brute_force_neighborhood_scan() {
        for seed in 0..8 {
            let mut board = Board::new(GameConfig::new(8, 8, 12).unwrap()).unwrap();
            let mut rng = SmallRng::seed_from_u64(seed);
            board.place_mines(&mut rng, (0, 0));
            board.compute_adjacency();

            for row in 0..8 {
                for col in 0..8 {
                    assert_eq!(
                        board.cell((row, col)).adjacent_mines(),
                        brute_force_count(&board, i32::from(row), i32::from(col)),
                    );
                }
            }
        }
    }

    #[test]
    fn single_center_mine_gives_every_other_cell_count_one() {
        let board = Board::with_mines(3, 3, &[(1, 1)]).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                let expected = if (row, col) == (1, 1) { 0 } else { 1 };
                assert_eq!(board.cell((row, col)).adjacent_mines(), expected);
            }
        }
    }

    #[test]
    fn with_mines_validates_layout() {
        assert_eq!(
            Board::with_mines(0, 3, &[(0, 0)]),
            Err(GameError::InvalidDimensions)
        );
        assert_eq!(
            Board::with_mines(3, 3, &[(3, 0)]),
            Err(GameError::OutOfBounds)
        );
        assert_eq!(Board::with_mines(3, 3, &[]), Err(GameError::InvalidMineCount));
        assert_eq!(
            Board::with_mines(1, 2, &[(0, 0), (0, 1)]),
            Err(GameError::InvalidMineCount)
        );
        // duplicates collapse to one mine
        let board = Board::with_mines(2, 2, &[(0, 0), (0, 0)]).unwrap();
        assert_eq!(board.mine_count(), 1);
    }

    #[test]
    fn revealing_a_numbered_cell_opens_only_that_cell() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();

        let update = board.reveal((1, 1)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::OpenedNumbered(1));
        assert_eq!(update.opened, vec![(1, 1)]);
        assert!(board.cell((1, 1)).is_open());
    }

    #[test]
    fn revealing_a_mine_detonates_and_still_reports_the_opened_cell() {
        let mut board = Board::with_mines(2, 2, &[(0, 0)]).unwrap();

        let update = board.reveal((0, 0)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::Detonated);
        assert_eq!(update.opened, vec![(0, 0)]);
        assert!(board.cell((0, 0)).is_open());
    }

    #[test]
    fn reveal_is_a_no_op_on_open_and_flagged_cells() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();

        board.reveal((1, 1)).unwrap();
        assert_eq!(board.reveal((1, 1)).unwrap(), RevealUpdate::no_op());

        board.toggle_flag((2, 2)).unwrap();
        assert_eq!(board.reveal((2, 2)).unwrap(), RevealUpdate::no_op());
        assert!(!board.cell((2, 2)).is_open());
    }

    #[test]
    fn cascade_opens_the_zero_region_and_its_numbered_frontier() {
        let mut board = Board::with_mines(3, 3, &[(2, 2)]).unwrap();

        let update = board.reveal((0, 0)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::OpenedEmpty);
        assert_eq!(update.opened.len(), 8);
        let distinct: BTreeSet<_> = update.opened.iter().copied().collect();
        assert_eq!(distinct.len(), 8);
        assert!(!board.cell((2, 2)).is_open());
    }

    #[test]
    fn cascade_never_opens_flagged_cells() {
        let mut board = Board::with_mines(3, 3, &[(2, 2)]).unwrap();
        board.toggle_flag((0, 1)).unwrap();

        let update = board.reveal((0, 0)).unwrap();

        // the flag at (0, 1) blocks the only zero-path to (0, 2)
        assert_eq!(update.outcome, RevealOutcome::OpenedEmpty);
        assert_eq!(update.opened.len(), 5);
        assert!(!board.cell((0, 1)).is_open());
        assert!(board.cell((0, 1)).is_flagged());
        assert!(!board.cell((0, 2)).is_open());
    }

    #[test]
    fn five_by_five_cascade_stops_at_the_mine_column() {
        let mines = [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)];
        let mut board = Board::with_mines(5, 5, &mines).unwrap();

        let update = board.reveal((0, 4)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::OpenedEmpty);
        // everything except the mined first column opens in one call
        assert_eq!(update.opened.len(), 20);
        let distinct: BTreeSet<_> = update.opened.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
        for row in 0..5 {
            assert!(!board.cell((row, 0)).is_open());
            assert!(board.cell((row, 1)).is_open());
            assert!(board.cell((row, 1)).adjacent_mines() > 0);
        }
    }

    #[test]
    fn flag_toggle_is_idempotent_over_two_calls() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();

        assert_eq!(board.toggle_flag((2, 2)).unwrap(), FlagOutcome::Flagged);
        assert_eq!(board.mines_left(), 0);
        assert_eq!(board.toggle_flag((2, 2)).unwrap(), FlagOutcome::Unflagged);
        assert_eq!(board.mines_left(), 1);
        assert_eq!(board.cell((2, 2)), Cell::default());
    }

    #[test]
    fn flagging_an_open_cell_is_a_no_op() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();
        board.reveal((1, 1)).unwrap();

        assert_eq!(board.toggle_flag((1, 1)).unwrap(), FlagOutcome::NoOp);
        assert!(!board.cell((1, 1)).is_flagged());
    }

    #[test]
    fn board_is_won_once_every_cell_is_open_or_flagged() {
        let mut board = Board::with_mines(1, 2, &[(0, 1)]).unwrap();
        assert!(!board.is_won());

        board.reveal((0, 0)).unwrap();
        assert!(!board.is_won());

        board.toggle_flag((0, 1)).unwrap();
        assert!(board.is_won());
    }

    #[test]
    fn chord_requires_a_matching_flag_count() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();
        board.reveal((1, 1)).unwrap();

        assert_eq!(board.chord_reveal((1, 1)).unwrap(), RevealUpdate::no_op());
        // a closed cell cannot chord either
        assert_eq!(board.chord_reveal((2, 2)).unwrap(), RevealUpdate::no_op());
    }

    #[test]
    fn chord_with_the_correct_flag_opens_all_remaining_neighbors() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();
        board.reveal((1, 1)).unwrap();
        board.toggle_flag((0, 0)).unwrap();

        let update = board.chord_reveal((1, 1)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::OpenedEmpty);
        assert_eq!(update.opened.len(), 7);
        let distinct: BTreeSet<_> = update.opened.iter().copied().collect();
        assert_eq!(distinct.len(), 7);
        assert!(board.is_won());
    }

    #[test]
    fn chord_with_a_misplaced_flag_detonates() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();
        board.reveal((1, 1)).unwrap();
        board.toggle_flag((0, 1)).unwrap();

        let update = board.chord_reveal((1, 1)).unwrap();

        assert_eq!(update.outcome, RevealOutcome::Detonated);
        assert!(update.opened.contains(&(0, 0)));
    }

    #[test]
    fn mine_coords_reports_the_exact_layout() {
        let mines = [(0, 2), (1, 0), (2, 1)];
        let board = Board::with_mines(3, 3, &mines).unwrap();

        assert_eq!(board.mine_coords(), BTreeSet::from(mines));
    }

    #[test]
    fn out_of_bounds_coordinates_are_rejected() {
        let mut board = Board::with_mines(3, 3, &[(0, 0)]).unwrap();

        assert_eq!(board.reveal((3, 0)), Err(GameError::OutOfBounds));
        assert_eq!(board.toggle_flag((0, 3)), Err(GameError::OutOfBounds));
        assert_eq!(board.chord_reveal((9, 9)), Err(GameError::OutOfBounds));
    }
}
