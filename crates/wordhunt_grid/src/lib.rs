//! Pure word-search puzzle logic.
//!
//! - **Catalog**: category name to fixed word list
//! - **Generator**: builds a letter grid hiding a word list
//! - **Placer**: places a single word by bounded random trial
//!
//! Everything here is deterministic given the random source, which every
//! entry point accepts as a parameter.
//!
//! # Example
//!
//! ```
//! use rand::{SeedableRng, rngs::StdRng};
//! use wordhunt_grid::{Category, GridGenerator};
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let words = Category::Animals.word_list();
//! let generated = GridGenerator::default().generate(10, 10, &words, &mut rng);
//! assert_eq!(generated.grid().height(), 10);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod generator;
mod placer;
mod types;

pub use catalog::Category;
pub use generator::{GeneratedGrid, GridGenerator};
pub use placer::{
    GridBuffer, MAX_PLACEMENT_ATTEMPTS, Placement, PlacementOutcome, WordPlacer, random_letter,
};
pub use types::{Cell, Direction, Grid, GridSize};
