//! Core grid types: cells, directions and the letter grid itself.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A coordinate on the grid, zero-based from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    /// Row index (grows downward).
    pub row: usize,
    /// Column index (grows rightward).
    pub col: usize,
}

impl Cell {
    /// Creates a new cell coordinate.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns the cell `steps` moves away in `direction`, or `None` when the
    /// result would have a negative coordinate.
    pub fn step(self, direction: Direction, steps: usize) -> Option<Self> {
        let (d_row, d_col) = direction.delta();
        let row = self.row as isize + d_row * steps as isize;
        let col = self.col as isize + d_col * steps as isize;
        if row < 0 || col < 0 {
            return None;
        }
        Some(Self::new(row as usize, col as usize))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Reading direction of a placed word.
///
/// Only forward directions exist. A word is never hidden right-to-left or
/// bottom-to-top, so it is never findable backward.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    /// Along a row, left to right.
    Right,
    /// Down a column.
    Down,
    /// Diagonal toward the bottom-right corner.
    DownRight,
    /// Diagonal toward the bottom-left corner.
    DownLeft,
}

impl Direction {
    /// Every allowed direction, in selection order.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::DownRight,
        Direction::DownLeft,
    ];

    /// Step vector as `(Δrow, Δcol)`.
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Self::Right => (0, 1),
            Self::Down => (1, 0),
            Self::DownRight => (1, 1),
            Self::DownLeft => (1, -1),
        }
    }

    /// Finds the direction whose step vector matches `(d_row, d_col)`.
    #[instrument]
    pub fn from_delta(d_row: isize, d_col: isize) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.delta() == (d_row, d_col))
    }

    /// Infers the direction of a path from its first two cells.
    ///
    /// Returns `None` for paths shorter than two cells or when the first step
    /// is not an allowed direction. Callers that need the whole path checked
    /// should use [`Direction::of_path`].
    pub fn from_first_step(path: &[Cell]) -> Option<Self> {
        let (first, second) = (path.first()?, path.get(1)?);
        let d_row = second.row as isize - first.row as isize;
        let d_col = second.col as isize - first.col as isize;
        Self::from_delta(d_row, d_col)
    }

    /// Returns the direction of `path` if every consecutive step uses the same
    /// allowed step vector.
    pub fn of_path(path: &[Cell]) -> Option<Self> {
        let direction = Self::from_first_step(path)?;
        let (d_row, d_col) = direction.delta();
        let straight = path.windows(2).all(|pair| {
            pair[1].row as isize - pair[0].row as isize == d_row
                && pair[1].col as isize - pair[0].col as isize == d_col
        });
        straight.then_some(direction)
    }
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl GridSize {
    /// Creates a new grid size.
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Returns `true` if `cell` lies inside these dimensions.
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.height && cell.col < self.width
    }
}

impl std::fmt::Display for GridSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A fully populated letter grid, stored row-major.
///
/// Serializes as a plain array of rows, each row an array of one-letter
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<char>>,
}

impl Grid {
    /// Builds a grid from rows of letters.
    pub fn from_rows(rows: Vec<Vec<char>>) -> Self {
        Self { rows }
    }

    /// Number of columns (width of the first row).
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Dimensions of this grid.
    pub fn size(&self) -> GridSize {
        GridSize::new(self.width(), self.height())
    }

    /// All rows, top to bottom.
    pub fn rows(&self) -> &[Vec<char>] {
        &self.rows
    }

    /// Letter at `cell`, if in bounds.
    pub fn get(&self, cell: Cell) -> Option<char> {
        self.rows.get(cell.row)?.get(cell.col).copied()
    }

    /// Reads the letters along `path`. Returns `None` if any cell is out of
    /// bounds.
    pub fn read(&self, path: &[Cell]) -> Option<String> {
        path.iter().map(|cell| self.get(*cell)).collect()
    }

    /// Returns `true` if every row has the same width and every cell holds an
    /// uppercase ASCII letter.
    pub fn is_fully_populated(&self) -> bool {
        let width = self.width();
        self.rows.iter().all(|row| {
            row.len() == width && row.iter().all(|letter| letter.is_ascii_uppercase())
        })
    }

    /// Searches the grid for `word` reading in any allowed direction and
    /// returns the path of the first occurrence, scanning row-major.
    pub fn locate(&self, word: &str) -> Option<Vec<Cell>> {
        let letters: Vec<char> = word.chars().collect();
        let first = *letters.first()?;
        let size = self.size();
        for row in 0..size.height {
            for col in 0..size.width {
                let start = Cell::new(row, col);
                if self.get(start) != Some(first) {
                    continue;
                }
                for direction in Direction::ALL {
                    let path: Option<Vec<Cell>> = (0..letters.len())
                        .map(|offset| start.step(direction, offset))
                        .collect();
                    let Some(path) = path else { continue };
                    let matches = path
                        .iter()
                        .zip(&letters)
                        .all(|(cell, letter)| self.get(*cell) == Some(*letter));
                    if matches {
                        return Some(path);
                    }
                }
            }
        }
        None
    }

    /// Formats the grid as space-separated rows.
    pub fn display(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(char::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
