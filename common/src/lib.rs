use itertools::Itertools;
use log::{debug, trace};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

/// Represents a 2D coordinate on the minesweeper board.
///
/// Ordering is derived so that enumeration for output can be sorted by
/// coordinate; it carries no other meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// The visible state of a single cell on the board.
/// This is the only state that is "remembered" between moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Cell {
    Hidden,
    Flagged,
    Revealed(u8), // The u8 is the number of adjacent mines.
}

/// Represents the current state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameState {
    Playing,
    Won,
    Lost,
}

/// Contract violations between the solver and its collaborators.
///
/// Both variants signal a corrupted knowledge base (bad adjacency data or a
/// double reveal) and must abort the current solving session rather than be
/// masked: continuing risks a false mine/safe classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("constraint count {count} out of range for {cells} cells")]
    InvalidConstraint { count: usize, cells: usize },
    #[error("cell {0:?} has already been observed")]
    DuplicateObservation(Point),
}

/// All in-bounds neighbors of a point under 8-connected adjacency.
/// It correctly handles board edges and corners.
pub fn neighbors(width: usize, height: usize, point: Point) -> impl Iterator<Item = Point> {
    (-1..=1).flat_map(move |dy: isize| {
        (-1..=1).filter_map(move |dx: isize| {
            // Skip the center point itself (dx=0, dy=0)
            if dx == 0 && dy == 0 {
                return None;
            }

            let nx = point.x as isize + dx;
            let ny = point.y as isize + dy;

            if nx >= 0 && nx < width as isize && ny >= 0 && ny < height as isize {
                Some(Point {
                    x: nx as usize,
                    y: ny as usize,
                })
            } else {
                None
            }
        })
    })
}

// --- Game (the board collaborator) ---

/// The main game struct, holding the hidden mine placement and the visible
/// board state.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Game {
    pub width: usize,
    pub height: usize,
    /// Ground truth: which cells contain mines. Never exposed to the solver.
    mines: Vec<Vec<bool>>,
    /// The visible state of the board.
    pub board: Vec<Vec<Cell>>,
    /// The total number of mines the board contains.
    pub total_mines: usize,
    /// Tracks the current status of the game (playing, won, lost).
    pub game_state: GameState,
}

impl Game {
    /// Creates a board with `total_mines` mines placed uniformly at random.
    pub fn new(width: usize, height: usize, total_mines: usize) -> Self {
        if total_mines >= width * height {
            panic!("Total mines must be less than the number of cells on the board.");
        }
        let mut rng = rand::rng();
        let mut placed: HashSet<Point> = HashSet::new();
        while placed.len() < total_mines {
            placed.insert(Point {
                x: rng.random_range(0..width),
                y: rng.random_range(0..height),
            });
        }
        Self::from_placement(width, height, &placed.into_iter().collect::<Vec<_>>())
    }

    /// Creates a board with an explicit mine placement, for scripted games
    /// and tests.
    pub fn with_mines(width: usize, height: usize, mine_cells: &[Point]) -> Self {
        Self::from_placement(width, height, mine_cells)
    }

    fn from_placement(width: usize, height: usize, mine_cells: &[Point]) -> Self {
        let mut mines = vec![vec![false; width]; height];
        for cell in mine_cells {
            mines[cell.y][cell.x] = true;
        }
        Game {
            width,
            height,
            mines,
            board: vec![vec![Cell::Hidden; width]; height],
            total_mines: mine_cells.len(),
            game_state: GameState::Playing,
        }
    }

    /// Deserializes a game state from bytes.
    pub fn deserialize(bts: &[u8]) -> Self {
        bcs::from_bytes(bts).unwrap()
    }

    /// Serializes the game state to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        bcs::to_bytes(self).unwrap()
    }

    pub fn is_mine(&self, at: Point) -> bool {
        self.mines[at.y][at.x]
    }

    /// The number of mines within one row and column of `at`, not counting
    /// the cell itself.
    pub fn nearby_mines(&self, at: Point) -> u8 {
        self.neighbors(at).filter(|&n| self.is_mine(n)).count() as u8
    }

    /// The board's act of exposing a cell.
    ///
    /// Returns `Some(count)` when the cell is clear: the board is updated
    /// with the revealed number and the win condition is checked. Returns
    /// `None` when the cell is a mine, which ends the game.
    ///
    /// Re-revealing an already revealed cell just reports its count again.
    /// Revealing after the game has ended, or revealing a flagged cell, is a
    /// protocol error.
    pub fn reveal_cell(&mut self, at: Point) -> anyhow::Result<Option<u8>> {
        if let Cell::Revealed(count) = self.board[at.y][at.x] {
            return Ok(Some(count));
        }
        if self.game_state != GameState::Playing {
            anyhow::bail!("game_ended");
        }
        if matches!(self.board[at.y][at.x], Cell::Flagged) {
            anyhow::bail!("cell_flagged");
        }

        if self.is_mine(at) {
            self.game_state = GameState::Lost;
            return Ok(None);
        }

        let count = self.nearby_mines(at);
        self.board[at.y][at.x] = Cell::Revealed(count);

        if self.check_win_condition() {
            self.game_state = GameState::Won;
        }

        Ok(Some(count))
    }

    /// Flags a hidden cell as a suspected mine. No-op on any other state.
    pub fn flag_cell(&mut self, at: Point) {
        if matches!(self.board[at.y][at.x], Cell::Hidden) {
            self.board[at.y][at.x] = Cell::Flagged;
        }
    }

    /// The game is won once every non-mine cell has been revealed.
    pub fn check_win_condition(&self) -> bool {
        (0..self.height).all(|y| {
            (0..self.width)
                .all(|x| self.mines[y][x] || matches!(self.board[y][x], Cell::Revealed(_)))
        })
    }

    /// All valid neighbor coordinates for a given point.
    pub fn neighbors(&self, at: Point) -> impl Iterator<Item = Point> {
        neighbors(self.width, self.height, at)
    }

    /// Every revealed cell together with its adjacent-mine count.
    pub fn revealed_cells(&self) -> impl Iterator<Item = (Point, u8)> {
        self.board.iter().enumerate().flat_map(|(y, row)| {
            row.iter().enumerate().filter_map(move |(x, cell)| match cell {
                Cell::Revealed(count) => Some((Point { x, y }, *count)),
                _ => None,
            })
        })
    }
}

// --- Constraint ---

/// A logical statement about the board: exactly `count` of the cells in
/// `members` are mines.
///
/// The invariant `count <= members.len()` holds for the whole life of the
/// value; the only mutation path is [`Constraint::remove_classified`], whose
/// caller guarantees the removed cell's classification is already settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    members: HashSet<Point>,
    count: usize,
}

impl Constraint {
    pub fn new(members: HashSet<Point>, count: usize) -> Result<Self, SolverError> {
        if count > members.len() {
            return Err(SolverError::InvalidConstraint {
                count,
                cells: members.len(),
            });
        }
        Ok(Constraint { members, count })
    }

    pub fn members(&self) -> &HashSet<Point> {
        &self.members
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Cells this constraint alone proves to be mines: if the remaining
    /// cells account for all the remaining mines, each must individually be
    /// a mine.
    pub fn known_mines(&self) -> HashSet<Point> {
        if !self.members.is_empty() && self.count == self.members.len() {
            self.members.clone()
        } else {
            HashSet::new()
        }
    }

    /// Cells this constraint alone proves to be safe: with zero mines left,
    /// every member is clear.
    pub fn known_safes(&self) -> HashSet<Point> {
        if self.count == 0 {
            self.members.clone()
        } else {
            HashSet::new()
        }
    }

    /// Drops a newly classified cell from the member set, adjusting the mine
    /// count when the cell turned out to be a mine. No-op for non-members.
    pub fn remove_classified(&mut self, cell: Point, is_mine: bool) {
        if self.members.remove(&cell) && is_mine {
            // The caller has settled this cell as a mine, so it was one of
            // the counted mines; the count cannot underflow.
            self.count -= 1;
        }
    }
}

// --- Solver (the inference engine) ---

/// Deduces certain mines and certain safe cells from a stream of
/// observations, by propagating a knowledge base of [`Constraint`]s to a
/// fixed point after every update.
///
/// The solver never guesses: every classification it reports is provable
/// from the observations it was given. Board bounds come from the board
/// collaborator at construction; each exploration loop owns its solver
/// exclusively.
pub struct Solver {
    width: usize,
    height: usize,
    /// Cells already observed. Grows monotonically.
    observed: HashSet<Point>,
    /// Cells proven safe. Grows monotonically.
    known_safe: HashSet<Point>,
    /// Cells proven to be mines. Grows monotonically.
    known_mines: HashSet<Point>,
    /// Active constraints. Order is irrelevant to correctness.
    constraints: Vec<Constraint>,
}

impl Solver {
    pub fn new(width: usize, height: usize) -> Self {
        Solver {
            width,
            height,
            observed: HashSet::new(),
            known_safe: HashSet::new(),
            known_mines: HashSet::new(),
            constraints: Vec::new(),
        }
    }

    /// Ingests the board's report that `cell` has `count` mines among its
    /// neighbors, then propagates the knowledge base to a fixed point.
    ///
    /// 1. Rejects a second observation of the same cell.
    /// 2. Marks the cell safe: the board only reports a count for a cell it
    ///    let the caller reveal.
    /// 3. Partitions the cell's neighbors into known mines (which discharge
    ///    part of the count), known safes (dropped), and unknown cells.
    /// 4. Turns the unknown cells and the remaining count into a constraint,
    ///    short-circuiting the degenerate all-safe / all-mine cases.
    /// 5. Propagates.
    ///
    /// A count inconsistent with the adjacency data surfaces as
    /// [`SolverError::InvalidConstraint`].
    pub fn observe(&mut self, cell: Point, count: u8) -> Result<(), SolverError> {
        if self.observed.contains(&cell) {
            return Err(SolverError::DuplicateObservation(cell));
        }
        debug!(target: "solver", "observation ({}, {}) = {}", cell.x, cell.y, count);

        self.observed.insert(cell);
        self.mark_safe(cell);

        let mut unknown: HashSet<Point> = HashSet::new();
        let mut already_mined = 0usize;
        for neighbor in neighbors(self.width, self.height, cell) {
            if self.known_mines.contains(&neighbor) {
                already_mined += 1;
            } else if !self.known_safe.contains(&neighbor) {
                unknown.insert(neighbor);
            }
        }

        let remaining = (count as usize).checked_sub(already_mined).ok_or(
            SolverError::InvalidConstraint {
                count: count as usize,
                cells: unknown.len(),
            },
        )?;

        if !unknown.is_empty() {
            self.add_constraint(Constraint::new(unknown, remaining)?);
        }

        self.propagate();
        Ok(())
    }

    /// Cells proven safe that have not been observed yet. Read-only.
    pub fn certain_safe_unplayed(&self) -> HashSet<Point> {
        self.known_safe.difference(&self.observed).copied().collect()
    }

    /// Cells proven to be mines. Read-only.
    pub fn certain_mines(&self) -> &HashSet<Point> {
        &self.known_mines
    }

    /// The first certain safe unplayed cell in coordinate order, so that
    /// move selection is deterministic.
    pub fn next_certain_safe_move(&self) -> Option<Point> {
        self.certain_safe_unplayed().into_iter().sorted().next()
    }

    /// Fallback for when no certain move exists: a uniformly random cell
    /// that has been neither observed nor proven to be a mine.
    pub fn random_move(&self, rng: &mut impl Rng) -> Option<Point> {
        let candidates: Vec<Point> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Point { x, y }))
            .filter(|cell| !self.observed.contains(cell) && !self.known_mines.contains(cell))
            .collect();
        candidates.choose(rng).copied()
    }

    /// Rebuilds a solver from a board by observing every revealed cell, in
    /// coordinate order. The knowledge base itself is never serialized; the
    /// visible board is enough to reconstruct it.
    pub fn replay(game: &Game) -> Result<Self, SolverError> {
        let mut solver = Solver::new(game.width, game.height);
        for (cell, count) in game.revealed_cells().sorted() {
            solver.observe(cell, count)?;
        }
        Ok(solver)
    }

    /// Records that `cell` is a mine and strips it from every constraint
    /// that mentions it. Returns whether this was news.
    fn mark_mine(&mut self, cell: Point) -> bool {
        if !self.known_mines.insert(cell) {
            return false;
        }
        debug_assert!(
            !self.known_safe.contains(&cell),
            "contradictory classification for {cell:?}"
        );
        trace!(target: "solver", "classified ({}, {}) as mine", cell.x, cell.y);
        for constraint in &mut self.constraints {
            constraint.remove_classified(cell, true);
        }
        true
    }

    /// Records that `cell` is safe and strips it from every constraint that
    /// mentions it. Returns whether this was news.
    fn mark_safe(&mut self, cell: Point) -> bool {
        if !self.known_safe.insert(cell) {
            return false;
        }
        debug_assert!(
            !self.known_mines.contains(&cell),
            "contradictory classification for {cell:?}"
        );
        trace!(target: "solver", "classified ({}, {}) as safe", cell.x, cell.y);
        for constraint in &mut self.constraints {
            constraint.remove_classified(cell, false);
        }
        true
    }

    /// The single insertion point for constraints, from observations and
    /// from the subset rule alike. Degenerate constraints are resolved on
    /// the spot instead of being stored: count zero classifies every member
    /// safe, a full count classifies every member a mine. Anything else is
    /// stored unless an equal constraint is already present.
    ///
    /// Returns whether the knowledge base changed.
    fn add_constraint(&mut self, constraint: Constraint) -> bool {
        if constraint.is_empty() {
            return false;
        }
        let mut changed = false;
        if constraint.count() == 0 {
            for &cell in constraint.members() {
                changed |= self.mark_safe(cell);
            }
        } else if constraint.count() == constraint.members().len() {
            for &cell in constraint.members() {
                changed |= self.mark_mine(cell);
            }
        } else if !self.constraints.contains(&constraint) {
            trace!(
                target: "solver",
                "new constraint over {} cells = {}",
                constraint.members().len(),
                constraint.count()
            );
            self.constraints.push(constraint);
            changed = true;
        }
        changed
    }

    /// Runs the two deduction rules to a least fixed point.
    ///
    /// Each outer pass first drains the direct rule (a constraint whose
    /// count is zero proves all members safe; one whose count equals its
    /// size proves all members mines), classifying cells and stripping them
    /// from every constraint, then runs the subset rule over the pruned
    /// arena: for constraints A ⊆ B, the cells of B − A hold exactly
    /// B.count − A.count mines. Derived constraints are staged and inserted
    /// only between passes, so the arena is never mutated while it is being
    /// compared against itself.
    ///
    /// Termination: the classified sets only grow and are bounded by the
    /// cell count, and the arena is deduplicated by structural equality.
    fn propagate(&mut self) {
        let mut passes = 0usize;
        loop {
            passes += 1;
            let mut changed = false;

            // Direct rule, drained to quiescence. A single classification
            // can satisfy several constraints at once, which is why the
            // marks fan out over the whole arena.
            loop {
                let mut mines: Vec<Point> = Vec::new();
                let mut safes: Vec<Point> = Vec::new();
                for constraint in &self.constraints {
                    mines.extend(constraint.known_mines());
                    safes.extend(constraint.known_safes());
                }
                if mines.is_empty() && safes.is_empty() {
                    break;
                }
                let mut any = false;
                for cell in mines {
                    any |= self.mark_mine(cell);
                }
                for cell in safes {
                    any |= self.mark_safe(cell);
                }
                changed |= any;
                if !any {
                    break;
                }
            }
            self.constraints.retain(|c| !c.is_empty());

            // Subset rule. Derivations whose count would go negative carry
            // no new information and are skipped.
            let mut staged: Vec<Constraint> = Vec::new();
            for (i, narrow) in self.constraints.iter().enumerate() {
                for (j, wide) in self.constraints.iter().enumerate() {
                    if i == j || !narrow.members().is_subset(wide.members()) {
                        continue;
                    }
                    let Some(count) = wide.count().checked_sub(narrow.count()) else {
                        continue;
                    };
                    let members: HashSet<Point> = wide
                        .members()
                        .difference(narrow.members())
                        .copied()
                        .collect();
                    if members.is_empty() {
                        continue;
                    }
                    // An over-large derived count only arises from an
                    // inconsistent arena; there is nothing sound to store.
                    let Ok(candidate) = Constraint::new(members, count) else {
                        continue;
                    };
                    if !self.constraints.contains(&candidate) && !staged.contains(&candidate) {
                        staged.push(candidate);
                    }
                }
            }
            for candidate in staged {
                changed |= self.add_constraint(candidate);
            }
            self.constraints.retain(|c| !c.is_empty());

            if !changed {
                break;
            }
        }
        trace!(
            target: "solver",
            "fixed point after {} passes, {} constraints active, {} mines / {} safes known",
            passes,
            self.constraints.len(),
            self.known_mines.len(),
            self.known_safe.len()
        );
    }
}
