//! Grid generation: seed random letters, then place words in list order.

use derive_getters::Getters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{Grid, GridBuffer, GridSize, Placement, PlacementOutcome, WordPlacer};

/// A generated puzzle: the letter grid plus a per-word placement report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GeneratedGrid {
    grid: Grid,
    placements: Vec<Placement>,
    skipped: Vec<String>,
}

impl GeneratedGrid {
    /// Words that were placed and can therefore be found, in placement order.
    pub fn findable(&self) -> impl Iterator<Item = &str> {
        self.placements.iter().map(|placement| placement.word().as_str())
    }

    /// Returns `true` if `word` was placed.
    pub fn is_findable(&self, word: &str) -> bool {
        self.findable().any(|placed| placed == word)
    }

    /// Placement record for `word`, if it was placed.
    pub fn placement(&self, word: &str) -> Option<&Placement> {
        self.placements
            .iter()
            .find(|placement| placement.word() == word)
    }

    /// Splits into the grid and the list of skipped words.
    pub fn into_parts(self) -> (Grid, Vec<Placement>, Vec<String>) {
        (self.grid, self.placements, self.skipped)
    }
}

/// Builds letter grids that hide a word list.
///
/// Words are placed in the order given, so earlier words win contested space
/// and later words are the ones dropped when the grid gets crowded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridGenerator {
    placer: WordPlacer,
}

impl GridGenerator {
    /// Creates a generator that uses `placer` for each word.
    pub fn new(placer: WordPlacer) -> Self {
        Self { placer }
    }

    /// Generates a `width × height` grid containing `words`, drawing all
    /// randomness from `rng`.
    ///
    /// Words that cannot be placed are recorded in
    /// [`GeneratedGrid::skipped`]; generation never fails.
    #[instrument(skip(self, words, rng), fields(word_count = words.len()))]
    pub fn generate<R, S>(&self, width: usize, height: usize, words: &[S], rng: &mut R) -> GeneratedGrid
    where
        R: Rng + ?Sized,
        S: AsRef<str>,
    {
        let mut buffer = GridBuffer::seeded(width, height, rng);
        let mut placements = Vec::with_capacity(words.len());
        let mut skipped = Vec::new();

        for word in words {
            match self.placer.place(&mut buffer, word.as_ref(), rng) {
                PlacementOutcome::Placed(placement) => placements.push(placement),
                PlacementOutcome::Exhausted { word, attempts } => {
                    warn!(%word, attempts, "Word omitted from grid");
                    skipped.push(word);
                }
            }
        }

        info!(
            size = %GridSize::new(width, height),
            placed = placements.len(),
            skipped = skipped.len(),
            "Generated grid"
        );

        GeneratedGrid {
            grid: buffer.into_grid(),
            placements,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Direction};
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_dimensions_match_request() {
        let mut rng = StdRng::seed_from_u64(11);
        let generated = GridGenerator::default().generate(12, 7, &["CAT"], &mut rng);
        assert_eq!(generated.grid().height(), 7);
        assert!(generated.grid().rows().iter().all(|row| row.len() == 12));
    }

    #[test]
    fn test_animals_fit_in_ten_by_ten() {
        let mut rng = StdRng::seed_from_u64(42);
        let words = Category::Animals.word_list();
        let generated = GridGenerator::default().generate(10, 10, &words, &mut rng);

        assert!(generated.skipped().is_empty(), "skipped: {:?}", generated.skipped());
        assert_eq!(generated.placements().len(), 8);
        assert!(generated.grid().is_fully_populated());
    }

    #[test]
    fn test_every_placement_reads_back_in_a_fixed_direction() {
        let mut rng = StdRng::seed_from_u64(99);
        let words = Category::Food.word_list();
        let generated = GridGenerator::default().generate(12, 12, &words, &mut rng);

        for placement in generated.placements() {
            assert_eq!(
                generated.grid().read(placement.path()).as_deref(),
                Some(placement.word().as_str())
            );
            assert_eq!(
                Direction::of_path(placement.path()),
                Some(*placement.direction())
            );
        }
    }

    #[test]
    fn test_same_seed_same_grid() {
        let words = Category::Sports.word_list();
        let a = GridGenerator::default().generate(10, 10, &words, &mut StdRng::seed_from_u64(5));
        let b = GridGenerator::default().generate(10, 10, &words, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_word_order_decides_who_gets_contested_space() {
        // A single 3-wide row has room for exactly one three-letter word.
        let first = GridGenerator::default().generate(3, 1, &["CAT", "DOG"], &mut StdRng::seed_from_u64(8));
        assert!(first.is_findable("CAT"));
        assert_eq!(first.skipped(), &vec!["DOG".to_string()]);

        let second = GridGenerator::default().generate(3, 1, &["DOG", "CAT"], &mut StdRng::seed_from_u64(8));
        assert!(second.is_findable("DOG"));
        assert_eq!(second.skipped(), &vec!["CAT".to_string()]);
    }

    #[test]
    fn test_skipped_words_leave_grid_populated() {
        let mut rng = StdRng::seed_from_u64(3);
        let generated = GridGenerator::default().generate(4, 4, &["HIPPOPOTAMUS", "OWL"], &mut rng);
        assert_eq!(generated.skipped(), &vec!["HIPPOPOTAMUS".to_string()]);
        assert!(!generated.is_findable("HIPPOPOTAMUS"));
        assert!(generated.is_findable("OWL"));
        assert!(generated.grid().is_fully_populated());
    }
}
