//! The shared session document and its pure transitions.
//!
//! Every transition takes `&self` and returns a new candidate state; nothing
//! here mutates a state in place. The candidate keeps the version it was
//! derived from. Only a store commit advances the version.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use wordhunt_grid::{Direction, GeneratedGrid, GridSize};

use crate::{
    BoardState, DEFAULT_HIGHLIGHT_COLOR, FoundWordRecord, PlayerId, SessionError, SessionId,
    SessionStatus, WordClaim,
};

/// One game instance shared by its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub(crate) id: SessionId,
    pub(crate) word_list: Vec<String>,
    pub(crate) grid_size: GridSize,
    pub(crate) category: String,
    pub(crate) participants: Vec<PlayerId>,
    pub(crate) game_state: BoardState,
    pub(crate) status: SessionStatus,
    pub(crate) version: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
}

/// Result of a transition that may legitimately change nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The state already satisfies the request; nothing to commit.
    Unchanged,
    /// Candidate state to commit.
    Next(SessionState),
}

/// Result of applying a word claim to a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim produced a new candidate (or, from the coordinator, the
    /// committed state).
    Claimed(SessionState),
    /// Someone already holds this word; the existing record is returned.
    AlreadyClaimed(FoundWordRecord),
}

impl ClaimOutcome {
    /// Returns `true` if this claim won the word.
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

impl SessionState {
    /// Builds the initial state of a freshly created session (version 0,
    /// status waiting) with the creator as the only participant.
    #[instrument(skip(word_list, generated, created_at), fields(words = word_list.len()))]
    pub fn new(
        id: SessionId,
        category: String,
        word_list: Vec<String>,
        generated: GeneratedGrid,
        creator: PlayerId,
        creator_color: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (grid, _, skipped) = generated.into_parts();
        let grid_size = grid.size();
        let mut game_state = BoardState::new(grid, skipped);
        game_state
            .player_colors
            .insert(creator.clone(), creator_color);

        info!(session_id = %id, %category, size = %grid_size, "Built initial session state");
        Self {
            id,
            word_list,
            grid_size,
            category,
            participants: vec![creator],
            game_state,
            status: SessionStatus::Waiting,
            version: 0,
            created_at,
            start_time: None,
            end_time: None,
        }
    }

    /// Returns a copy carrying `version`. Used by stores when committing.
    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Returns `true` if `player_id` has joined.
    pub fn is_participant(&self, player_id: &str) -> bool {
        self.participants.iter().any(|id| id == player_id)
    }

    /// Words that were placed in the grid and so can be claimed.
    pub fn findable_words(&self) -> impl Iterator<Item = &str> {
        self.word_list
            .iter()
            .map(String::as_str)
            .filter(|word| !self.game_state.skipped_words.iter().any(|s| s == word))
    }

    /// Findable words nobody has claimed yet.
    pub fn remaining_words(&self) -> Vec<&str> {
        self.findable_words()
            .filter(|word| !self.game_state.found_words.contains_key(*word))
            .collect()
    }

    /// Returns `true` when every findable word has been claimed.
    pub fn all_words_found(&self) -> bool {
        self.remaining_words().is_empty()
    }

    /// Adds `participant_id` with `color`.
    ///
    /// Joining twice is a no-op: an existing participant yields
    /// [`Transition::Unchanged`], so no commit and no version bump happens.
    #[instrument(skip(self), fields(session_id = %self.id, version = self.version))]
    pub fn join(&self, participant_id: &str, color: &str) -> Result<Transition, SessionError> {
        if participant_id.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "Participant id is required".to_string(),
            ));
        }
        if self.is_participant(participant_id) {
            debug!(participant_id, "Already a participant");
            return Ok(Transition::Unchanged);
        }
        if self.status.is_terminal() {
            warn!(participant_id, "Join rejected, session has ended");
            return Err(SessionError::SessionClosed(self.id.clone()));
        }

        let mut next = self.clone();
        next.participants.push(participant_id.to_string());
        next.game_state
            .player_colors
            .insert(participant_id.to_string(), color.to_string());
        debug!(participant_id, color, "Participant added to candidate");
        Ok(Transition::Next(next))
    }

    /// Applies a word claim.
    ///
    /// The first claim to be committed wins. If the word is already in the
    /// ledger the existing record comes back as
    /// [`ClaimOutcome::AlreadyClaimed`]. A successful claim moves a waiting
    /// session to active, and completes it when no findable word remains.
    #[instrument(skip(self, claim, now), fields(session_id = %self.id, version = self.version, word = %claim.word(), finder = %claim.finder_id()))]
    pub fn claim(&self, claim: &WordClaim, now: DateTime<Utc>) -> Result<ClaimOutcome, SessionError> {
        if self.status.is_terminal() {
            warn!("Claim rejected, session has ended");
            return Err(SessionError::SessionClosed(self.id.clone()));
        }
        if !self.is_participant(claim.finder_id()) {
            warn!("Claim from non-participant");
            return Err(SessionError::NotParticipant(claim.finder_id().clone()));
        }
        if let Some(existing) = self.game_state.found(claim.word()) {
            info!(winner = %existing.finder_id(), "Word already claimed");
            return Ok(ClaimOutcome::AlreadyClaimed(existing.clone()));
        }
        self.validate_claim(claim)?;

        let color = self
            .game_state
            .color_of(claim.finder_id())
            .unwrap_or(DEFAULT_HIGHLIGHT_COLOR)
            .to_string();
        let record = FoundWordRecord::new(
            claim.word().clone(),
            claim.finder_id().clone(),
            claim.path().clone(),
            color,
        );

        let mut next = self.clone();
        next.game_state
            .found_words
            .insert(claim.word().clone(), record);

        if next.status == SessionStatus::Waiting {
            next.status = SessionStatus::Active;
            next.start_time = Some(now);
        }
        if next.all_words_found() {
            info!("Last findable word claimed, completing session");
            next.status = SessionStatus::Completed;
            next.end_time = Some(now);
        }

        Ok(ClaimOutcome::Claimed(next))
    }

    /// Structural checks a claim must pass before it may be committed.
    fn validate_claim(&self, claim: &WordClaim) -> Result<(), SessionError> {
        let word = claim.word();
        let path = claim.path();

        if word.is_empty() {
            return Err(SessionError::InvalidInput("Word is required".to_string()));
        }
        if !self.word_list.iter().any(|w| w == word) {
            return Err(SessionError::InvalidInput(format!(
                "{} is not in this session's word list",
                word
            )));
        }
        if self.game_state.skipped_words.iter().any(|w| w == word) {
            return Err(SessionError::InvalidInput(format!(
                "{} was never placed in the grid",
                word
            )));
        }
        let letters = word.chars().count();
        if path.len() != letters {
            return Err(SessionError::InvalidInput(format!(
                "Path has {} cells but {} has {} letters",
                path.len(),
                word,
                letters
            )));
        }
        if letters > 1 && Direction::of_path(path).is_none() {
            return Err(SessionError::InvalidInput(
                "Path is not a straight forward line".to_string(),
            ));
        }
        match self.game_state.grid.read(path) {
            Some(read) if read == *word => Ok(()),
            Some(read) => Err(SessionError::InvalidInput(format!(
                "Path spells {}, not {}",
                read, word
            ))),
            None => Err(SessionError::InvalidInput(
                "Path leaves the grid".to_string(),
            )),
        }
    }

    /// Host decision to begin play: waiting becomes active.
    #[instrument(skip(self, now), fields(session_id = %self.id, status = %self.status))]
    pub fn start(&self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        match self.status {
            SessionStatus::Waiting => {
                let mut next = self.clone();
                next.status = SessionStatus::Active;
                next.start_time = Some(now);
                Ok(Transition::Next(next))
            }
            SessionStatus::Active => Ok(Transition::Unchanged),
            SessionStatus::Completed => Err(SessionError::SessionClosed(self.id.clone())),
        }
    }

    /// External end decision (time limit or host): moves to completed.
    /// Ending an already completed session changes nothing.
    #[instrument(skip(self, now), fields(session_id = %self.id, status = %self.status))]
    pub fn end(&self, now: DateTime<Utc>) -> Transition {
        if self.status.is_terminal() {
            return Transition::Unchanged;
        }
        let mut next = self.clone();
        next.status = SessionStatus::Completed;
        next.start_time.get_or_insert(now);
        next.end_time = Some(now);
        Transition::Next(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use wordhunt_grid::{Category, Cell, GridGenerator};

    fn animals_session() -> SessionState {
        let words = Category::Animals.word_list();
        let generated =
            GridGenerator::default().generate(10, 10, &words, &mut StdRng::seed_from_u64(42));
        SessionState::new(
            "game-1".to_string(),
            "animals".to_string(),
            words,
            generated,
            "alice".to_string(),
            "#FF0000".to_string(),
            Utc::now(),
        )
    }

    fn claim_for(state: &SessionState, finder: &str, word: &str) -> WordClaim {
        let path = state
            .game_state()
            .grid()
            .locate(word)
            .expect("word is in the grid");
        WordClaim::new(finder.to_string(), word.to_string(), path)
    }

    fn next(transition: Transition) -> SessionState {
        match transition {
            Transition::Next(state) => state,
            Transition::Unchanged => panic!("expected a change"),
        }
    }

    fn claimed(outcome: ClaimOutcome) -> SessionState {
        match outcome {
            ClaimOutcome::Claimed(state) => state,
            ClaimOutcome::AlreadyClaimed(record) => panic!("already claimed by {:?}", record),
        }
    }

    #[test]
    fn test_new_session_shape() {
        let state = animals_session();
        assert_eq!(*state.version(), 0);
        assert_eq!(*state.status(), SessionStatus::Waiting);
        assert_eq!(state.participants(), &vec!["alice".to_string()]);
        assert_eq!(state.game_state().color_of("alice"), Some("#FF0000"));
        assert_eq!(*state.grid_size(), GridSize::new(10, 10));
        assert_eq!(state.findable_words().count(), 8);
    }

    #[test]
    fn test_join_adds_participant_without_bumping_version() {
        let state = animals_session();
        let joined = next(state.join("bob", "#00FF00").expect("join"));
        assert!(joined.is_participant("bob"));
        assert_eq!(joined.game_state().color_of("bob"), Some("#00FF00"));
        assert_eq!(joined.version(), state.version());
    }

    #[test]
    fn test_join_twice_is_unchanged() {
        let state = animals_session();
        let joined = next(state.join("userX", "#8B5CF6").expect("join"));
        assert_eq!(
            joined.join("userX", "#8B5CF6").expect("rejoin"),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_claim_records_finder_color_and_activates() {
        let state = next(animals_session().join("bob", "#00FF00").expect("join"));
        let claim = claim_for(&state, "bob", "CAT");
        let after = claimed(state.claim(&claim, Utc::now()).expect("claim"));

        let record = after.game_state().found("CAT").expect("recorded");
        assert_eq!(record.finder_id(), "bob");
        assert_eq!(record.color(), "#00FF00");
        assert_eq!(record.path(), claim.path());
        assert_eq!(*after.status(), SessionStatus::Active);
        assert!(after.start_time().is_some());
    }

    #[test]
    fn test_second_claim_for_same_word_is_already_claimed() {
        let state = next(animals_session().join("bob", "#00FF00").expect("join"));
        let alice_claim = claim_for(&state, "alice", "DOG");
        let after = claimed(state.claim(&alice_claim, Utc::now()).expect("claim"));

        let bob_claim = claim_for(&after, "bob", "DOG");
        match after.claim(&bob_claim, Utc::now()).expect("claim") {
            ClaimOutcome::AlreadyClaimed(record) => assert_eq!(record.finder_id(), "alice"),
            ClaimOutcome::Claimed(_) => panic!("second claim must not overwrite"),
        }
    }

    #[test]
    fn test_claim_rejects_wrong_path_length() {
        let state = animals_session();
        let mut path = state.game_state().grid().locate("BIRD").expect("placed");
        path.pop();
        let claim = WordClaim::new("alice".to_string(), "BIRD".to_string(), path);
        assert!(matches!(
            state.claim(&claim, Utc::now()),
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_claim_rejects_bent_path_and_wrong_letters() {
        let state = animals_session();
        let bent = WordClaim::new(
            "alice".to_string(),
            "CAT".to_string(),
            vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 1)],
        );
        assert!(matches!(
            state.claim(&bent, Utc::now()),
            Err(SessionError::InvalidInput(_))
        ));

        let off_grid = WordClaim::new(
            "alice".to_string(),
            "CAT".to_string(),
            vec![Cell::new(0, 8), Cell::new(0, 9), Cell::new(0, 10)],
        );
        assert!(matches!(
            state.claim(&off_grid, Utc::now()),
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_claim_rejects_unknown_word_and_outsider() {
        let state = animals_session();
        let unknown = WordClaim::new("alice".to_string(), "ZEBRA".to_string(), vec![]);
        assert!(matches!(
            state.claim(&unknown, Utc::now()),
            Err(SessionError::InvalidInput(_))
        ));

        let outsider = claim_for(&state, "mallory", "CAT");
        assert_eq!(
            state.claim(&outsider, Utc::now()),
            Err(SessionError::NotParticipant("mallory".to_string()))
        );
    }

    #[test]
    fn test_claiming_every_word_completes_session() {
        let mut state = animals_session();
        let words: Vec<String> = state.findable_words().map(str::to_string).collect();
        for word in &words {
            let claim = claim_for(&state, "alice", word);
            state = claimed(state.claim(&claim, Utc::now()).expect("claim"));
        }
        assert_eq!(*state.status(), SessionStatus::Completed);
        assert!(state.end_time().is_some());
        assert!(state.remaining_words().is_empty());

        let late = WordClaim::new("alice".to_string(), "CAT".to_string(), vec![]);
        assert!(matches!(
            state.claim(&late, Utc::now()),
            Err(SessionError::SessionClosed(_))
        ));
    }

    #[test]
    fn test_skipped_words_are_not_findable() {
        let words = vec!["CAT".to_string(), "ELEPHANT".to_string()];
        let generated =
            GridGenerator::default().generate(4, 4, &words, &mut StdRng::seed_from_u64(9));
        let state = SessionState::new(
            "small".to_string(),
            "animals".to_string(),
            words,
            generated,
            "alice".to_string(),
            DEFAULT_HIGHLIGHT_COLOR.to_string(),
            Utc::now(),
        );
        assert_eq!(state.findable_words().collect::<Vec<_>>(), vec!["CAT"]);

        let claim = WordClaim::new(
            "alice".to_string(),
            "ELEPHANT".to_string(),
            (0..8).map(|col| Cell::new(0, col)).collect(),
        );
        assert!(matches!(
            state.claim(&claim, Utc::now()),
            Err(SessionError::InvalidInput(_))
        ));

        // Finding the only placed word finishes the game.
        let cat = claim_for(&state, "alice", "CAT");
        let after = claimed(state.claim(&cat, Utc::now()).expect("claim"));
        assert_eq!(*after.status(), SessionStatus::Completed);
    }

    #[test]
    fn test_start_and_end_transitions() {
        let state = animals_session();
        let started = next(state.start(Utc::now()).expect("start"));
        assert_eq!(*started.status(), SessionStatus::Active);
        assert_eq!(started.start(Utc::now()).expect("start"), Transition::Unchanged);

        let ended = next(started.end(Utc::now()));
        assert_eq!(*ended.status(), SessionStatus::Completed);
        assert_eq!(ended.end(Utc::now()), Transition::Unchanged);
        assert!(matches!(
            ended.start(Utc::now()),
            Err(SessionError::SessionClosed(_))
        ));
        assert!(matches!(
            ended.join("carol", "#000000"),
            Err(SessionError::SessionClosed(_))
        ));
    }
}
