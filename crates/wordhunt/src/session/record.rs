//! Value types stored inside a session document.

use std::collections::BTreeMap;

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use wordhunt_grid::{Cell, Grid};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Unique identifier for a player (account id from the identity provider).
pub type PlayerId = String;

/// Highlight color used when a profile does not supply one.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#8B5CF6";

/// Lifecycle status of a persisted session.
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
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    /// Created, no word claimed yet.
    #[default]
    Waiting,
    /// At least one word claimed or the host started the game.
    Active,
    /// Terminal: every findable word is claimed or the game was ended.
    Completed,
}

impl SessionStatus {
    /// Returns `true` for the terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Durable claim that a participant found a word along a path.
///
/// At most one record exists per word per session; the first committed claim
/// wins and is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct FoundWordRecord {
    word: String,
    finder_id: PlayerId,
    path: Vec<Cell>,
    color: String,
}

/// A player's request to claim a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct WordClaim {
    finder_id: PlayerId,
    word: String,
    path: Vec<Cell>,
}

impl WordClaim {
    /// Returns a copy with the word uppercased.
    pub fn normalized(&self) -> Self {
        Self {
            finder_id: self.finder_id.clone(),
            word: self.word.trim().to_uppercase(),
            path: self.path.clone(),
        }
    }
}

/// The mutable board portion of a session: grid, found-word ledger and
/// player colors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub(crate) grid: Grid,
    #[serde(default)]
    pub(crate) found_words: BTreeMap<String, FoundWordRecord>,
    #[serde(default)]
    pub(crate) player_colors: BTreeMap<PlayerId, String>,
    /// Words that could not be placed during generation.
    #[serde(default)]
    pub(crate) skipped_words: Vec<String>,
}

impl BoardState {
    /// Creates a board with an empty ledger.
    pub fn new(grid: Grid, skipped_words: Vec<String>) -> Self {
        Self {
            grid,
            found_words: BTreeMap::new(),
            player_colors: BTreeMap::new(),
            skipped_words,
        }
    }

    /// Highlight color registered for `player_id`.
    pub fn color_of(&self, player_id: &str) -> Option<&str> {
        self.player_colors.get(player_id).map(String::as_str)
    }

    /// Ledger entry for `word`, if it has been claimed.
    pub fn found(&self, word: &str) -> Option<&FoundWordRecord> {
        self.found_words.get(word)
    }
}
