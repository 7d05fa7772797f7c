//! Single-word placement over a mutable grid buffer.

use derive_getters::Getters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::{Cell, Direction, Grid, GridSize};

/// Upper bound on random (direction, start) draws per word.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 100;

/// Working buffer used while a grid is being generated.
///
/// Every cell starts as a random seed letter. A cell is *claimed* once a word
/// has been written through it; claimed cells only accept the same letter
/// again, so two words may cross on a shared letter but never overwrite each
/// other.
#[derive(Debug, Clone)]
pub struct GridBuffer {
    letters: Vec<Vec<char>>,
    claimed: Vec<Vec<bool>>,
}

impl GridBuffer {
    /// Creates a `width × height` buffer with every cell seeded by a uniformly
    /// random uppercase letter.
    #[instrument(skip(rng))]
    pub fn seeded<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Self {
        let letters = (0..height)
            .map(|_| (0..width).map(|_| random_letter(rng)).collect())
            .collect();
        debug!(width, height, "Seeded grid buffer");
        Self {
            letters,
            claimed: vec![vec![false; width]; height],
        }
    }

    /// Dimensions of the buffer.
    pub fn size(&self) -> GridSize {
        GridSize::new(self.letters.first().map_or(0, Vec::len), self.letters.len())
    }

    /// Returns `true` if no cell exists to start a word from.
    pub fn is_empty(&self) -> bool {
        let size = self.size();
        size.width == 0 || size.height == 0
    }

    /// Computes the path `word` would occupy starting at `start` in
    /// `direction`, if every cell is in bounds and either unclaimed or already
    /// holding the required letter.
    pub fn fit(&self, word: &[char], start: Cell, direction: Direction) -> Option<Vec<Cell>> {
        let size = self.size();
        let mut path = Vec::with_capacity(word.len());
        for (offset, letter) in word.iter().enumerate() {
            let cell = start.step(direction, offset)?;
            if !size.contains(cell) {
                return None;
            }
            if self.claimed[cell.row][cell.col] && self.letters[cell.row][cell.col] != *letter {
                return None;
            }
            path.push(cell);
        }
        Some(path)
    }

    /// Writes `word` along `path` and claims those cells.
    fn write(&mut self, word: &[char], path: &[Cell]) {
        for (letter, cell) in word.iter().zip(path) {
            self.letters[cell.row][cell.col] = *letter;
            self.claimed[cell.row][cell.col] = true;
        }
    }

    /// Returns `true` if a word has been written through `cell`.
    pub fn is_claimed(&self, cell: Cell) -> bool {
        self.claimed
            .get(cell.row)
            .and_then(|row| row.get(cell.col))
            .copied()
            .unwrap_or(false)
    }

    /// Finalizes the buffer into an immutable grid.
    pub fn into_grid(self) -> Grid {
        Grid::from_rows(self.letters)
    }
}

/// Draws a uniformly random uppercase ASCII letter.
pub fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
    char::from(b'A' + rng.random_range(0..26u8))
}

/// A word that was successfully written into the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Placement {
    word: String,
    direction: Direction,
    path: Vec<Cell>,
}

impl Placement {
    /// First cell of the word.
    pub fn start(&self) -> Option<Cell> {
        self.path.first().copied()
    }
}

/// Result of trying to place one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// The word was written into the buffer.
    Placed(Placement),
    /// Every attempt collided or ran off the grid; the buffer is unchanged.
    Exhausted {
        /// The word that could not be placed.
        word: String,
        /// Number of attempts made before giving up.
        attempts: usize,
    },
}

impl PlacementOutcome {
    /// Returns the placement if the word was placed.
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            Self::Placed(placement) => Some(placement),
            Self::Exhausted { .. } => None,
        }
    }

    /// Returns `true` if the word was placed.
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed(_))
    }
}

/// Places words by random trial: a uniformly chosen direction and start cell
/// per attempt, bounded by `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordPlacer {
    max_attempts: usize,
}

impl Default for WordPlacer {
    fn default() -> Self {
        Self {
            max_attempts: MAX_PLACEMENT_ATTEMPTS,
        }
    }
}

impl WordPlacer {
    /// Attempt bound per word.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Tries to place `word` into `buffer`.
    ///
    /// On success the word's letters are written along the returned path in
    /// one step. On exhaustion the buffer is left untouched.
    #[instrument(skip(self, buffer, rng), fields(max_attempts = self.max_attempts))]
    pub fn place<R: Rng + ?Sized>(
        &self,
        buffer: &mut GridBuffer,
        word: &str,
        rng: &mut R,
    ) -> PlacementOutcome {
        let letters: Vec<char> = word.chars().collect();
        if letters.is_empty() || buffer.is_empty() {
            warn!(word, "Nothing to place or no room to place it");
            return PlacementOutcome::Exhausted {
                word: word.to_string(),
                attempts: 0,
            };
        }

        let size = buffer.size();
        for attempt in 1..=self.max_attempts {
            let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
            let start = Cell::new(
                rng.random_range(0..size.height),
                rng.random_range(0..size.width),
            );

            if let Some(path) = buffer.fit(&letters, start, direction) {
                buffer.write(&letters, &path);
                debug!(word, %direction, %start, attempt, "Placed word");
                return PlacementOutcome::Placed(Placement {
                    word: word.to_string(),
                    direction,
                    path,
                });
            }
            trace!(word, %direction, %start, attempt, "Placement attempt rejected");
        }

        warn!(word, attempts = self.max_attempts, "Could not place word");
        PlacementOutcome::Exhausted {
            word: word.to_string(),
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn chars(word: &str) -> Vec<char> {
        word.chars().collect()
    }

    #[test]
    fn test_seeded_buffer_is_fully_lettered() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = GridBuffer::seeded(6, 4, &mut rng).into_grid();
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 6);
        assert!(grid.is_fully_populated());
    }

    #[test]
    fn test_fit_rejects_out_of_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let buffer = GridBuffer::seeded(3, 3, &mut rng);
        assert!(buffer.fit(&chars("CAT"), Cell::new(0, 1), Direction::Right).is_none());
        assert!(buffer.fit(&chars("CAT"), Cell::new(1, 0), Direction::Down).is_none());
        assert!(buffer.fit(&chars("CAT"), Cell::new(0, 1), Direction::DownLeft).is_none());
        assert!(buffer.fit(&chars("CAT"), Cell::new(0, 2), Direction::DownLeft).is_some());
    }

    #[test]
    fn test_claimed_cells_only_accept_matching_letters() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut buffer = GridBuffer::seeded(3, 3, &mut rng);
        let path = buffer
            .fit(&chars("CAT"), Cell::new(0, 0), Direction::Right)
            .expect("fits");
        buffer.write(&chars("CAT"), &path);

        // Crossing through the shared 'A' is allowed.
        assert!(buffer.fit(&chars("BAD"), Cell::new(0, 1), Direction::Down).is_none());
        assert!(buffer.fit(&chars("ABC"), Cell::new(0, 1), Direction::Down).is_some());
        // Overwriting 'C' with 'D' is not.
        assert!(buffer.fit(&chars("DOG"), Cell::new(0, 0), Direction::Down).is_none());
    }

    #[test]
    fn test_place_writes_word_along_path() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut buffer = GridBuffer::seeded(8, 8, &mut rng);
        let outcome = WordPlacer::default().place(&mut buffer, "WOLF", &mut rng);
        let placement = outcome.placement().expect("WOLF fits in 8x8").clone();
        assert_eq!(placement.path().len(), 4);
        assert!(placement.path().iter().all(|cell| buffer.is_claimed(*cell)));

        let grid = buffer.into_grid();
        assert_eq!(grid.read(placement.path()).as_deref(), Some("WOLF"));
        assert_eq!(Direction::of_path(placement.path()), Some(*placement.direction()));
    }

    #[test]
    fn test_place_exhausts_when_word_cannot_fit() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut buffer = GridBuffer::seeded(3, 3, &mut rng);
        let before = buffer.clone().into_grid();
        let outcome = WordPlacer::default().place(&mut buffer, "ELEPHANT", &mut rng);
        assert_eq!(
            outcome,
            PlacementOutcome::Exhausted {
                word: "ELEPHANT".to_string(),
                attempts: MAX_PLACEMENT_ATTEMPTS,
            }
        );
        assert_eq!(buffer.into_grid(), before);
    }

    #[test]
    fn test_place_on_empty_buffer_is_exhausted_immediately() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut buffer = GridBuffer::seeded(0, 0, &mut rng);
        let outcome = WordPlacer::default().place(&mut buffer, "CAT", &mut rng);
        assert!(matches!(outcome, PlacementOutcome::Exhausted { attempts: 0, .. }));
    }
}
