//! Static category catalog: category name to fixed word list.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::{debug, instrument, warn};

/// A word category with a fixed word list.
///
/// Names parse case-insensitively. Unknown names resolve to the default
/// category ([`Category::Animals`]) instead of failing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    /// Animal names.
    #[default]
    Animals,
    /// Color names.
    Colors,
    /// Sports and activities.
    Sports,
    /// Things to eat.
    Food,
}

const ANIMALS: &[&str] = &["CAT", "DOG", "BIRD", "FISH", "LION", "BEAR", "WOLF", "DEER"];
const COLORS: &[&str] = &[
    "RED", "BLUE", "GREEN", "YELLOW", "ORANGE", "PURPLE", "PINK", "BROWN",
];
const SPORTS: &[&str] = &[
    "SOCCER", "TENNIS", "GOLF", "SWIM", "RUN", "JUMP", "BIKE", "SURF",
];
const FOOD: &[&str] = &[
    "PIZZA", "BURGER", "SALAD", "SOUP", "CAKE", "BREAD", "RICE", "PASTA",
];

impl Category {
    /// Resolves a category by name, falling back to the default category for
    /// unknown names.
    #[instrument]
    pub fn resolve(name: &str) -> Self {
        match Self::from_str(name.trim()) {
            Ok(category) => {
                debug!(%category, "Resolved category");
                category
            }
            Err(_) => {
                let fallback = Self::default();
                warn!(name, %fallback, "Unknown category, using fallback");
                fallback
            }
        }
    }

    /// The fixed word list for this category, uppercase, in placement order.
    pub fn words(self) -> &'static [&'static str] {
        match self {
            Self::Animals => ANIMALS,
            Self::Colors => COLORS,
            Self::Sports => SPORTS,
            Self::Food => FOOD,
        }
    }

    /// Owned copy of [`Category::words`].
    pub fn word_list(self) -> Vec<String> {
        self.words().iter().map(|word| (*word).to_string()).collect()
    }

    /// Every category in the catalog.
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_categories() {
        assert_eq!(Category::resolve("animals"), Category::Animals);
        assert_eq!(Category::resolve("Colors"), Category::Colors);
        assert_eq!(Category::resolve(" SPORTS "), Category::Sports);
        assert_eq!(Category::resolve("food"), Category::Food);
    }

    #[test]
    fn test_unknown_category_falls_back_to_animals() {
        assert_eq!(Category::resolve("dinosaurs"), Category::Animals);
        assert_eq!(Category::resolve(""), Category::Animals);
    }

    #[test]
    fn test_word_lists_are_uppercase_and_nonempty() {
        for category in Category::all() {
            let words = category.words();
            assert_eq!(words.len(), 8, "{category} should have 8 words");
            for word in words {
                assert!(!word.is_empty());
                assert!(word.chars().all(|c| c.is_ascii_uppercase()), "{word}");
            }
        }
    }

    #[test]
    fn test_animals_word_list_order() {
        assert_eq!(
            Category::Animals.word_list(),
            vec!["CAT", "DOG", "BIRD", "FISH", "LION", "BEAR", "WOLF", "DEER"]
        );
    }

    #[test]
    fn test_display_round_trips_through_resolve() {
        for category in Category::all() {
            assert_eq!(Category::resolve(&category.to_string()), category);
        }
    }
}
