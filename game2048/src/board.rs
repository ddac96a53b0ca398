//! Board representation and the move/merge/spawn rules.
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::GameError;

pub const DEFAULT_SIZE: usize = 4;
pub const DEFAULT_WIN_TARGET: u32 = 2048;
pub const MIN_SIZE: usize = 2;
pub const MAX_SIZE: usize = 8;

/// Chance that a spawned tile is a 2 rather than a 4.
const TWO_PROBABILITY: f64 = 0.9;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Move::Up),
            "down" => Ok(Move::Down),
            "left" => Ok(Move::Left),
            "right" => Ok(Move::Right),
            _ => Err(GameError::UnknownMove(s.to_string())),
        }
    }
}

/// Square grid stored row-major; 0 marks an empty cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    size: usize,
    cells: Vec<u32>,
}

/// Result of sliding every line of a board in one direction, before spawning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slide {
    pub board: Board,
    pub gained: u64,
    pub merges: usize,
}

impl Board {
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Build a board from explicit rows. Every row must have the same length
    /// as the number of rows and every tile must be a power of two >= 2.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Result<Self, GameError> {
        let size = rows.len();
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(GameError::InvalidBoard(format!(
                "size {size} is outside {MIN_SIZE}-{MAX_SIZE}"
            )));
        }
        let mut cells = Vec::with_capacity(size * size);
        for (row_idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != size {
                return Err(GameError::InvalidBoard(format!(
                    "row {row_idx} has {} cells, expected {size}",
                    row.len()
                )));
            }
            for &value in row {
                if value != 0 && (value < 2 || !value.is_power_of_two()) {
                    return Err(GameError::InvalidBoard(format!(
                        "tile {value} in row {row_idx} is not a power of two"
                    )));
                }
                cells.push(value);
            }
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[row * self.size + col]
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn rows(&self) -> Vec<Vec<u32>> {
        self.cells.chunks(self.size).map(|row| row.to_vec()).collect()
    }

    pub fn empty_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn tile_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    pub fn tile_sum(&self) -> u64 {
        self.cells.iter().map(|&v| v as u64).sum()
    }

    pub fn max_tile(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    pub fn reached(&self, target: u32) -> bool {
        self.cells.iter().any(|&v| v >= target)
    }

    /// True while at least one direction would change the board.
    pub fn has_moves(&self) -> bool {
        if self.cells.contains(&0) {
            return true;
        }
        let n = self.size;
        for row in 0..n {
            for col in 0..n {
                let v = self.get(row, col);
                if col + 1 < n && self.get(row, col + 1) == v {
                    return true;
                }
                if row + 1 < n && self.get(row + 1, col) == v {
                    return true;
                }
            }
        }
        false
    }

    /// Slide every line toward the edge named by `mv`. Lines are scanned once
    /// from that edge, so a tile produced by a merge never merges again in
    /// the same move: `[2,2,2,2]` left gives `[4,4,0,0]`.
    pub fn slide(&self, mv: Move) -> Slide {
        let mut board = self.clone();
        let mut gained = 0;
        let mut merges = 0;
        for lane in 0..self.size {
            let indices = self.lane(mv, lane);
            let line: Vec<u32> = indices.iter().map(|&idx| self.cells[idx]).collect();
            let (packed, lane_gain, lane_merges) = slide_line(&line);
            for (&idx, value) in indices.iter().zip(packed) {
                board.cells[idx] = value;
            }
            gained += lane_gain;
            merges += lane_merges;
        }
        Slide {
            board,
            gained,
            merges,
        }
    }

    /// Cell indices of one row or column, ordered from the edge `mv` moves toward.
    fn lane(&self, mv: Move, lane: usize) -> Vec<usize> {
        let n = self.size;
        match mv {
            Move::Left => (0..n).map(|col| lane * n + col).collect(),
            Move::Right => (0..n).rev().map(|col| lane * n + col).collect(),
            Move::Up => (0..n).map(|row| row * n + lane).collect(),
            Move::Down => (0..n).rev().map(|row| row * n + lane).collect(),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.cells.chunks(self.size).enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            let line: Vec<String> = row.iter().map(|v| format!("{v:>4}")).collect();
            f.write_str(&line.join(" "))?;
        }
        Ok(())
    }
}

fn slide_line(line: &[u32]) -> (Vec<u32>, u64, usize) {
    let mut packed = Vec::with_capacity(line.len());
    let mut gained = 0;
    let mut merges = 0;
    let mut pending: Option<u32> = None;
    for &value in line.iter().filter(|&&v| v != 0) {
        match pending.take() {
            Some(prev) if prev == value => {
                let merged = prev * 2;
                packed.push(merged);
                gained += merged as u64;
                merges += 1;
            }
            Some(prev) => {
                packed.push(prev);
                pending = Some(value);
            }
            None => pending = Some(value),
        }
    }
    packed.extend(pending);
    packed.resize(line.len(), 0);
    (packed, gained, merges)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    InProgress,
    Won,
    Lost,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::InProgress)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    score: u64,
    moves: u32,
    status: Status,
    win_target: u32,
}

impl GameState {
    /// Wrap an existing board; the status is derived from its tiles.
    pub fn from_board(board: Board, score: u64, win_target: u32) -> Self {
        let status = status_for(&board, win_target);
        Self {
            board,
            score,
            moves: 0,
            status,
            win_target,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn win_target(&self) -> u32 {
        self.win_target
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        !self.status.is_terminal() && self.board.slide(mv).board != self.board
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        Move::ALL
            .iter()
            .copied()
            .filter(|&mv| self.is_legal(mv))
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    pub row: usize,
    pub col: usize,
    pub value: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub state: GameState,
    pub changed: bool,
    pub gained: u64,
    pub merges: usize,
    pub spawned: Option<Spawn>,
}

/// Start a game: an empty grid with two tiles at distinct random cells.
pub fn new_game<R: Rng + ?Sized>(
    size: usize,
    win_target: u32,
    rng: &mut R,
) -> Result<GameState, GameError> {
    if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
        return Err(GameError::config(
            "board_size",
            format!("{size} is outside {MIN_SIZE}-{MAX_SIZE}"),
        ));
    }
    if win_target < 4 || !win_target.is_power_of_two() {
        return Err(GameError::config(
            "win_target",
            format!("{win_target} is not a power of two >= 4"),
        ));
    }
    let mut board = Board::empty(size);
    spawn_tile(&mut board, rng);
    spawn_tile(&mut board, rng);
    Ok(GameState::from_board(board, 0, win_target))
}

/// Apply one move. A move that neither slides nor merges anything, or any
/// move on a finished game, returns the state untouched with `changed`
/// false and spawns nothing.
pub fn apply_move<R: Rng + ?Sized>(state: &GameState, mv: Move, rng: &mut R) -> MoveOutcome {
    let unchanged = || MoveOutcome {
        state: state.clone(),
        changed: false,
        gained: 0,
        merges: 0,
        spawned: None,
    };
    if state.status.is_terminal() {
        return unchanged();
    }
    let Slide {
        mut board,
        gained,
        merges,
    } = state.board.slide(mv);
    if board == state.board {
        return unchanged();
    }
    let spawned = spawn_tile(&mut board, rng);
    let status = status_for(&board, state.win_target);
    MoveOutcome {
        state: GameState {
            board,
            score: state.score + gained,
            moves: state.moves + 1,
            status,
            win_target: state.win_target,
        },
        changed: true,
        gained,
        merges,
        spawned,
    }
}

fn spawn_tile<R: Rng + ?Sized>(board: &mut Board, rng: &mut R) -> Option<Spawn> {
    let empty = board.empty_cells();
    let &idx = empty.choose(rng)?;
    let value = if rng.gen_bool(TWO_PROBABILITY) { 2 } else { 4 };
    board.cells[idx] = value;
    Some(Spawn {
        row: idx / board.size,
        col: idx % board.size,
        value,
    })
}

fn status_for(board: &Board, win_target: u32) -> Status {
    if board.reached(win_target) {
        Status::Won
    } else if !board.has_moves() {
        Status::Lost
    } else {
        Status::InProgress
    }
}
