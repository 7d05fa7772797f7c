//! Per-player handle that drives a shared session through the store.
//!
//! Every mutation follows the same loop: read the committed state, compute a
//! candidate with a pure transition, and commit it with a version check. A
//! lost race re-reads and re-applies the same intent against the fresh
//! state. Committed states are pushed to subscribers through the
//! [`SyncChannel`]; pushes received back replace the cached view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use wordhunt_grid::{Category, Cell, GridGenerator, GridSize};

use crate::{
    ClaimOutcome, CoordinatorSettings, PlayerId, ProfileDirectory, SessionError,
    SessionId, SessionState, SessionStatus, SessionStore, Subscription, SyncChannel, Transition,
    UpdateHandler, WordClaim,
};

/// Publishes tried for one commit before the handle gives up on telling
/// other players.
const PUBLISH_ATTEMPTS: usize = 3;

/// Lifecycle of a local session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum HandlePhase {
    /// Not attached to any session.
    #[default]
    Idle,
    /// A create is in flight.
    Creating,
    /// A join is in flight.
    Joining,
    /// Attached to a running session.
    Active,
    /// Detached by the player.
    Left,
    /// Attached to a session that has completed.
    Ended,
}

impl HandlePhase {
    fn as_str(self) -> &'static str {
        self.into()
    }

    /// Returns `true` while a session is cached and operations may target it.
    pub fn is_attached(self) -> bool {
        matches!(self, Self::Active | Self::Ended)
    }

    fn accepts_updates(self) -> bool {
        matches!(self, Self::Creating | Self::Joining | Self::Active | Self::Ended)
    }
}

/// Cached view shared with the subscription callback.
#[derive(Debug, Default)]
struct LocalView {
    phase: HandlePhase,
    cached: Option<SessionState>,
}

impl LocalView {
    /// Replaces the cached state with `state` unless it belongs to another
    /// session or is not newer than what is cached.
    fn absorb(&mut self, state: SessionState) -> bool {
        if !self.phase.accepts_updates() {
            debug!(phase = %self.phase, "Ignoring update while detached");
            return false;
        }
        if let Some(cached) = &self.cached {
            if cached.id() != state.id() {
                debug!(cached = %cached.id(), incoming = %state.id(), "Ignoring update for another session");
                return false;
            }
            if cached.version() >= state.version() {
                debug!(cached = cached.version(), incoming = state.version(), "Ignoring stale update");
                return false;
            }
        }
        if self.phase == HandlePhase::Active && *state.status() == SessionStatus::Completed {
            info!(session_id = %state.id(), "Session completed");
            self.phase = HandlePhase::Ended;
        }
        self.cached = Some(state);
        true
    }

    /// Attaches to `state`, keeping a newer push of the same session that
    /// arrived while the create or join was in flight.
    fn attach(&mut self, state: SessionState) {
        let newer = self
            .cached
            .as_ref()
            .is_some_and(|c| c.id() == state.id() && c.version() > state.version());
        if !newer {
            self.cached = Some(state);
        }
        let completed = self
            .cached
            .as_ref()
            .is_some_and(|c| c.status().is_terminal());
        self.phase = if completed {
            HandlePhase::Ended
        } else {
            HandlePhase::Active
        };
    }

    fn reset(&mut self, phase: HandlePhase) {
        self.phase = phase;
        self.cached = None;
    }
}

/// What a transition asks the commit loop to do.
enum Decision<T> {
    /// Nothing to write; hand `T` back to the caller.
    Keep(T),
    /// Commit this candidate. Returned from the loop holding the committed
    /// state.
    Write(SessionState),
}

/// One player's handle on a shared session.
pub struct SessionCoordinator {
    player_id: PlayerId,
    store: Arc<dyn SessionStore>,
    channel: Arc<dyn SyncChannel>,
    profiles: Arc<dyn ProfileDirectory>,
    settings: CoordinatorSettings,
    generator: GridGenerator,
    rng: StdRng,
    view: Arc<Mutex<LocalView>>,
    subscription: Option<Subscription>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("player_id", &self.player_id)
            .field("settings", &self.settings)
            .field("phase", &self.phase())
            .field("session_id", &self.session_id())
            .finish()
    }
}

impl SessionCoordinator {
    /// Creates an idle handle for `player_id`.
    #[instrument(skip(store, channel, profiles, settings), fields(player_id = %player_id))]
    pub fn new(
        player_id: PlayerId,
        store: Arc<dyn SessionStore>,
        channel: Arc<dyn SyncChannel>,
        profiles: Arc<dyn ProfileDirectory>,
        settings: CoordinatorSettings,
    ) -> Self {
        info!(
            max_commit_attempts = settings.max_commit_attempts(),
            "Creating session coordinator"
        );
        Self {
            player_id,
            store,
            channel,
            profiles,
            settings,
            generator: GridGenerator::default(),
            rng: StdRng::from_os_rng(),
            view: Arc::new(Mutex::new(LocalView::default())),
            subscription: None,
        }
    }

    /// Makes grid generation reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Player this handle acts for.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Current handle phase.
    pub fn phase(&self) -> HandlePhase {
        self.view().phase
    }

    /// Id of the attached session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.view().cached.as_ref().map(|s| s.id().clone())
    }

    /// Latest state this handle has seen, committed by anyone.
    pub fn current(&self) -> Option<SessionState> {
        self.view().cached.clone()
    }

    /// Creates a session from a catalog category and joins it as creator.
    ///
    /// Unknown categories fall back to the catalog default. Words that do
    /// not fit the grid are left out of the findable set.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is already attached.
    /// - [`SessionError::InvalidInput`] for a zero-sized grid.
    /// - [`SessionError::TransportUnavailable`] if the store, channel or
    ///   profile directory cannot be reached. The handle returns to idle.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub async fn create_game(
        &mut self,
        category: &str,
        size: GridSize,
    ) -> Result<SessionState, SessionError> {
        let category = Category::resolve(category);
        self.create_game_with_words(category.as_ref(), category.word_list(), size)
            .await
    }

    /// Creates a session hiding a caller-supplied word list.
    ///
    /// Words are trimmed and uppercased; the order given is the placement
    /// priority. Repeated words are kept once.
    ///
    /// # Errors
    ///
    /// As [`SessionCoordinator::create_game`], plus
    /// [`SessionError::InvalidInput`] for an empty word list or a word that
    /// is blank or has characters outside `A-Z`.
    #[instrument(skip(self, words), fields(player_id = %self.player_id, word_count = words.len()))]
    pub async fn create_game_with_words(
        &mut self,
        category: &str,
        words: Vec<String>,
        size: GridSize,
    ) -> Result<SessionState, SessionError> {
        self.ensure_detached()?;
        let words = normalize_words(words)?;
        if size.width == 0 || size.height == 0 {
            return Err(SessionError::InvalidInput(format!(
                "Grid must be at least 1x1, got {}",
                size
            )));
        }

        self.view().reset(HandlePhase::Creating);
        match self.create_inner(category, words, size).await {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(error = %e, "Create failed, handle back to idle");
                self.detach(HandlePhase::Idle);
                Err(e)
            }
        }
    }

    async fn create_inner(
        &mut self,
        category: &str,
        words: Vec<String>,
        size: GridSize,
    ) -> Result<SessionState, SessionError> {
        let color = self.color().await?;
        let generated = self
            .generator
            .generate(size.width, size.height, &words, &mut self.rng);
        for word in generated.skipped() {
            warn!(word = %word, "Word left out of the grid");
        }

        let state = SessionState::new(
            Uuid::new_v4().to_string(),
            category.to_string(),
            words,
            generated,
            self.player_id.clone(),
            color,
            Utc::now(),
        );
        let created = self.store.create(state).await?;
        info!(session_id = %created.id(), size = %size, "Session created");

        self.subscribe(created.id()).await?;
        self.view().attach(created.clone());
        Ok(created)
    }

    /// Joins an existing session with the player's profile color.
    ///
    /// Joining a session the player is already in commits nothing and
    /// returns the stored state unchanged.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is already attached.
    /// - [`SessionError::NotFound`] if no such session exists.
    /// - [`SessionError::SessionClosed`] if it has completed.
    /// - [`SessionError::Congested`] if every commit attempt conflicted.
    /// - [`SessionError::TransportUnavailable`] if a collaborator is down.
    /// - [`SessionError::Unpublished`] if the join committed but could not be
    ///   announced. The handle is attached all the same.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub async fn join_game(&mut self, session_id: &str) -> Result<SessionState, SessionError> {
        self.ensure_detached()?;
        if session_id.trim().is_empty() {
            return Err(SessionError::InvalidInput("Session id is required".to_string()));
        }

        self.view().reset(HandlePhase::Joining);
        match self.join_inner(session_id).await {
            Ok(state) => Ok(state),
            Err(e @ SessionError::Unpublished { .. }) => {
                warn!(error = %e, "Joined, but other players were not told");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Join failed, handle back to idle");
                self.detach(HandlePhase::Idle);
                Err(e)
            }
        }
    }

    async fn join_inner(&mut self, session_id: &str) -> Result<SessionState, SessionError> {
        let color = self.color().await?;
        let player_id = self.player_id.clone();

        // Listen first: every commit after this point is pushed, and the
        // load below sees every commit before it.
        self.subscribe(session_id).await?;

        let decided = self
            .commit_with_retry(session_id, |state| {
                Ok(match state.join(&player_id, &color)? {
                    Transition::Unchanged => Decision::Keep(state.clone()),
                    Transition::Next(next) => Decision::Write(next),
                })
            })
            .await;
        let state = match decided {
            Ok(decided) => decided,
            Err(SessionError::Unpublished { state, reason }) => {
                self.view().attach((*state).clone());
                return Err(SessionError::Unpublished { state, reason });
            }
            Err(e) => return Err(e),
        };
        let state = match state {
            Decision::Keep(state) => {
                debug!("Already a participant, nothing committed");
                state
            }
            Decision::Write(state) => {
                info!(version = state.version(), "Joined session");
                state
            }
        };

        self.view().attach(state.clone());
        Ok(state)
    }

    /// Claims `word` along `path`.
    ///
    /// The first claim the store commits wins. Losing the race, or claiming
    /// a word someone already holds, returns
    /// [`ClaimOutcome::AlreadyClaimed`] with the winning record.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is not attached.
    /// - [`SessionError::InvalidInput`] if the claim is malformed or does not
    ///   match the grid.
    /// - [`SessionError::SessionClosed`] if the session has completed.
    /// - [`SessionError::Congested`] if every commit attempt conflicted.
    /// - [`SessionError::TransportUnavailable`] if a collaborator is down.
    /// - [`SessionError::Unpublished`] if the claim committed but could not
    ///   be announced; [`SessionError::committed_state`] holds the result.
    #[instrument(skip(self, path), fields(player_id = %self.player_id, cells = path.len()))]
    pub async fn find_word(
        &self,
        word: &str,
        path: Vec<Cell>,
    ) -> Result<ClaimOutcome, SessionError> {
        let session_id = self.attached_session()?;
        let claim = WordClaim::new(self.player_id.clone(), word.to_string(), path).normalized();
        if claim.word().is_empty() {
            return Err(SessionError::InvalidInput("Word is required".to_string()));
        }
        if claim.path().is_empty() {
            return Err(SessionError::InvalidInput("Path is required".to_string()));
        }

        let decided = self
            .commit_with_retry(&session_id, |state| {
                Ok(match state.claim(&claim, Utc::now())? {
                    ClaimOutcome::Claimed(next) => Decision::Write(next),
                    ClaimOutcome::AlreadyClaimed(record) => Decision::Keep(record),
                })
            })
            .await?;

        Ok(match decided {
            Decision::Write(state) => {
                info!(word = %claim.word(), version = state.version(), "Word claimed");
                ClaimOutcome::Claimed(state)
            }
            Decision::Keep(record) => {
                info!(word = %claim.word(), winner = %record.finder_id(), "Word already claimed");
                ClaimOutcome::AlreadyClaimed(record)
            }
        })
    }

    /// Moves a waiting session to active. Starting an active session
    /// commits nothing.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is not attached.
    /// - [`SessionError::NotParticipant`] if the player is not in the session.
    /// - [`SessionError::SessionClosed`] if the session has completed.
    /// - [`SessionError::Congested`], [`SessionError::TransportUnavailable`]
    ///   or [`SessionError::Unpublished`] as for any commit.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub async fn start_game(&self) -> Result<SessionState, SessionError> {
        let session_id = self.attached_session()?;
        let player_id = self.player_id.clone();
        let decided = self
            .commit_with_retry(&session_id, |state| {
                if !state.is_participant(&player_id) {
                    return Err(SessionError::NotParticipant(player_id.clone()));
                }
                Ok(match state.start(Utc::now())? {
                    Transition::Unchanged => Decision::Keep(state.clone()),
                    Transition::Next(next) => Decision::Write(next),
                })
            })
            .await?;
        Ok(settled(decided))
    }

    /// Completes the session on a host or time-limit decision. Ending a
    /// completed session commits nothing.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is not attached.
    /// - [`SessionError::NotParticipant`] if the player is not in the session.
    /// - [`SessionError::Congested`], [`SessionError::TransportUnavailable`]
    ///   or [`SessionError::Unpublished`] as for any commit.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub async fn end_game(&self) -> Result<SessionState, SessionError> {
        let session_id = self.attached_session()?;
        let player_id = self.player_id.clone();
        let decided = self
            .commit_with_retry(&session_id, |state| {
                if !state.is_participant(&player_id) {
                    return Err(SessionError::NotParticipant(player_id.clone()));
                }
                Ok(match state.end(Utc::now()) {
                    Transition::Unchanged => Decision::Keep(state.clone()),
                    Transition::Next(next) => Decision::Write(next),
                })
            })
            .await?;
        let state = settled(decided);
        info!(session_id = %state.id(), "Session ended");
        Ok(state)
    }

    /// Re-reads the authoritative state into the cached view.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] if the handle is not attached.
    /// - [`SessionError::NotFound`] / [`SessionError::TransportUnavailable`]
    ///   from the store.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub async fn refresh(&self) -> Result<SessionState, SessionError> {
        let session_id = self.attached_session()?;
        let state = self.store.load(&session_id).await?;
        self.view().absorb(state);
        self.current()
            .ok_or_else(|| SessionError::WrongPhase {
                expected: HandlePhase::Active.as_str(),
                actual: self.phase().as_str(),
            })
    }

    /// Folds a pushed state into the cached view. States for other
    /// sessions, or not newer than the cached one, are ignored.
    ///
    /// Returns `true` if the view changed.
    #[instrument(skip(self, state), fields(session_id = %state.id(), version = state.version()))]
    pub fn apply_remote(&self, state: SessionState) -> bool {
        self.view().absorb(state)
    }

    /// Detaches from the session: unsubscribes and drops the cached view.
    /// The stored session is not touched. Leaving twice does nothing.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub fn leave_game(&mut self) {
        if self.subscription.is_none() && !self.phase().is_attached() {
            debug!("Not attached, nothing to leave");
            return;
        }
        self.detach(HandlePhase::Left);
        info!("Left session");
    }

    /// Load, decide, compare-and-swap, publish. Retries the same decision
    /// against fresh state on version conflicts. A commit whose publish keeps
    /// failing stays committed and comes back as
    /// [`SessionError::Unpublished`].
    async fn commit_with_retry<T, F>(
        &self,
        session_id: &str,
        mut decide: F,
    ) -> Result<Decision<T>, SessionError>
    where
        F: FnMut(&SessionState) -> Result<Decision<T>, SessionError> + Send,
    {
        let max_attempts = *self.settings.max_commit_attempts();
        for attempt in 1..=max_attempts {
            let current = self.store.load(session_id).await?;
            let base_version = *current.version();
            debug!(attempt, base_version, "Read session");

            let candidate = match decide(&current)? {
                Decision::Keep(value) => {
                    self.view().absorb(current);
                    return Ok(Decision::Keep(value));
                }
                Decision::Write(candidate) => candidate,
            };

            match self
                .store
                .compare_and_swap(session_id, base_version, candidate)
                .await
            {
                Ok(committed) => {
                    debug!(attempt, version = committed.version(), "Committed");
                    self.view().absorb(committed.clone());
                    self.publish(&committed).await?;
                    return Ok(Decision::Write(committed));
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, base_version, "Version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(session_id, attempts = max_attempts, "Giving up after repeated conflicts");
        Err(SessionError::Congested {
            session_id: session_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Publishes a committed state, retrying a few times before reporting
    /// it as [`SessionError::Unpublished`].
    async fn publish(&self, committed: &SessionState) -> Result<(), SessionError> {
        let mut last_error = None;
        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self.channel.publish(committed).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "Publish failed");
                    last_error = Some(e);
                }
            }
        }
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        error!(version = committed.version(), reason = %reason, "Commit kept but never published");
        Err(SessionError::Unpublished {
            state: Box::new(committed.clone()),
            reason,
        })
    }

    async fn subscribe(&mut self, session_id: &str) -> Result<(), SessionError> {
        let view = Arc::clone(&self.view);
        let handler: UpdateHandler = Arc::new(move |update| {
            lock(&view).absorb(update.into_state());
        });
        let subscription = self.channel.subscribe(session_id, handler).await?;
        if let Some(mut previous) = self.subscription.replace(subscription) {
            previous.unsubscribe();
        }
        Ok(())
    }

    async fn color(&self) -> Result<String, SessionError> {
        let profile = self.profiles.profile(&self.player_id).await?;
        let fallback = self.settings.default_color();
        let color = match &profile {
            Some(profile) => profile.color_or(fallback).to_string(),
            None => {
                debug!("No profile, using default color");
                fallback.clone()
            }
        };
        Ok(color)
    }

    fn detach(&mut self, phase: HandlePhase) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.view().reset(phase);
    }

    fn ensure_detached(&self) -> Result<(), SessionError> {
        let phase = self.phase();
        match phase {
            HandlePhase::Idle | HandlePhase::Left => Ok(()),
            _ => Err(SessionError::WrongPhase {
                expected: HandlePhase::Idle.as_str(),
                actual: phase.as_str(),
            }),
        }
    }

    fn attached_session(&self) -> Result<SessionId, SessionError> {
        let view = self.view();
        match (&view.cached, view.phase.is_attached()) {
            (Some(state), true) => Ok(state.id().clone()),
            _ => Err(SessionError::WrongPhase {
                expected: HandlePhase::Active.as_str(),
                actual: view.phase.as_str(),
            }),
        }
    }

    fn view(&self) -> MutexGuard<'_, LocalView> {
        lock(&self.view)
    }
}

/// The view holds plain data, so a panic mid-update cannot leave it
/// half-written; recover the guard instead of failing.
fn lock(view: &Mutex<LocalView>) -> MutexGuard<'_, LocalView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

fn settled(decision: Decision<SessionState>) -> SessionState {
    match decision {
        Decision::Keep(state) | Decision::Write(state) => state,
    }
}

/// Trims and uppercases `words`, dropping repeats after the first.
fn normalize_words(words: Vec<String>) -> Result<Vec<String>, SessionError> {
    if words.is_empty() {
        return Err(SessionError::InvalidInput("Word list is empty".to_string()));
    }
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(words.len());
    for word in words {
        let word = word.trim().to_uppercase();
        if word.is_empty() {
            return Err(SessionError::InvalidInput(
                "Word list contains a blank word".to_string(),
            ));
        }
        if !word.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(SessionError::InvalidInput(format!(
                "Word {:?} has characters outside A-Z",
                word
            )));
        }
        if seen.insert(word.clone()) {
            normalized.push(word);
        } else {
            debug!(word = %word, "Dropping repeated word");
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BroadcastChannel, MemoryProfiles, MemorySessionStore, Profile};

    fn coordinator(player: &str, store: &MemorySessionStore) -> SessionCoordinator {
        SessionCoordinator::new(
            player.to_string(),
            Arc::new(store.clone()),
            Arc::new(BroadcastChannel::new()),
            Arc::new(MemoryProfiles::new()),
            CoordinatorSettings::default(),
        )
        .with_seed(42)
    }

    #[tokio::test]
    async fn test_create_attaches_handle() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        assert_eq!(host.phase(), HandlePhase::Idle);

        let state = host
            .create_game("animals", GridSize::new(10, 10))
            .await
            .expect("create");
        assert_eq!(host.phase(), HandlePhase::Active);
        assert_eq!(*state.version(), 0);
        assert_eq!(state.category(), "animals");
        assert_eq!(host.current(), Some(state));
    }

    #[tokio::test]
    async fn test_unknown_category_falls_back() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let state = host
            .create_game("dinosaurs", GridSize::new(10, 10))
            .await
            .expect("create");
        assert_eq!(state.category(), "animals");
        assert_eq!(state.word_list(), &Category::Animals.word_list());
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_handle_idle() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let err = host
            .create_game_with_words("custom", vec![], GridSize::new(5, 5))
            .await
            .expect_err("empty list");
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(host.phase(), HandlePhase::Idle);
        assert!(store.list_sessions().expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_create_twice_is_wrong_phase() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        host.create_game("food", GridSize::new(10, 10))
            .await
            .expect("create");
        assert!(matches!(
            host.create_game("food", GridSize::new(10, 10)).await,
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[tokio::test]
    async fn test_join_missing_session_returns_to_idle() {
        let store = MemorySessionStore::new();
        let mut guest = coordinator("guest", &store);
        assert_eq!(
            guest.join_game("nope").await,
            Err(SessionError::NotFound("nope".to_string()))
        );
        assert_eq!(guest.phase(), HandlePhase::Idle);
        assert!(guest.current().is_none());
    }

    #[tokio::test]
    async fn test_profile_color_used_on_join() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let created = host
            .create_game("colors", GridSize::new(10, 10))
            .await
            .expect("create");

        let profiles = MemoryProfiles::new();
        profiles
            .insert(Profile::new("guest".into(), "Guest".into(), Some("#00AA00".into())))
            .expect("insert");
        let mut guest = SessionCoordinator::new(
            "guest".to_string(),
            Arc::new(store.clone()),
            Arc::new(BroadcastChannel::new()),
            Arc::new(profiles),
            CoordinatorSettings::default(),
        );
        let joined = guest.join_game(created.id()).await.expect("join");
        assert_eq!(joined.game_state().color_of("guest"), Some("#00AA00"));
        assert_eq!(joined.game_state().color_of("host"), Some("#8B5CF6"));
        assert_eq!(*joined.version(), 1);
    }

    #[tokio::test]
    async fn test_find_word_before_attaching_is_wrong_phase() {
        let store = MemorySessionStore::new();
        let host = coordinator("host", &store);
        assert!(matches!(
            host.find_word("CAT", vec![Cell::new(0, 0)]).await,
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_remote_ignores_stale_and_foreign_states() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let created = host
            .create_game("animals", GridSize::new(10, 10))
            .await
            .expect("create");
        let started = host.start_game().await.expect("start");
        assert_eq!(*started.version(), 1);

        assert!(!host.apply_remote(created.clone()));
        assert_eq!(host.current().map(|s| *s.version()), Some(1));

        let mut other = coordinator("other", &store);
        let foreign = other
            .create_game("sports", GridSize::new(10, 10))
            .await
            .expect("create")
            .with_version(9);
        assert!(!host.apply_remote(foreign));
    }

    #[tokio::test]
    async fn test_end_game_moves_handle_to_ended() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        host.create_game("animals", GridSize::new(10, 10))
            .await
            .expect("create");
        let ended = host.end_game().await.expect("end");
        assert_eq!(*ended.status(), SessionStatus::Completed);
        assert_eq!(host.phase(), HandlePhase::Ended);

        let again = host.end_game().await.expect("end again");
        assert_eq!(again.version(), ended.version());
    }

    #[tokio::test]
    async fn test_leave_discards_view_and_is_idempotent() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let created = host
            .create_game("animals", GridSize::new(10, 10))
            .await
            .expect("create");

        host.leave_game();
        host.leave_game();
        assert_eq!(host.phase(), HandlePhase::Left);
        assert!(host.current().is_none());
        assert!(store.load(created.id()).await.is_ok());
    }

    #[test]
    fn test_normalize_words_drops_repeats() {
        let words = vec![" cat".to_string(), "DOG".to_string(), "Cat".to_string()];
        assert_eq!(
            normalize_words(words).expect("valid"),
            vec!["CAT".to_string(), "DOG".to_string()]
        );
    }

    #[test]
    fn test_normalize_words_rejects_non_letters() {
        for bad in ["SEA LION", "R2D2", "CAFÉ", "   "] {
            let result = normalize_words(vec!["CAT".to_string(), bad.to_string()]);
            assert!(
                matches!(result, Err(SessionError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_custom_words_with_repeats_are_all_claimable() {
        let store = MemorySessionStore::new();
        let mut host = coordinator("host", &store);
        let state = host
            .create_game_with_words(
                "custom",
                vec!["OWL".into(), "owl".into(), "EMU".into()],
                GridSize::new(6, 6),
            )
            .await
            .expect("create");
        assert_eq!(state.word_list(), &vec!["OWL".to_string(), "EMU".to_string()]);
        assert!(state.game_state().skipped_words().is_empty());
    }

    #[test]
    fn test_attach_keeps_newer_completed_push() {
        let generated = GridGenerator::default().generate(
            10,
            10,
            &Category::Animals.word_list(),
            &mut StdRng::seed_from_u64(3),
        );
        let base = SessionState::new(
            "g1".to_string(),
            "animals".to_string(),
            Category::Animals.word_list(),
            generated,
            "host".to_string(),
            "#8B5CF6".to_string(),
            Utc::now(),
        )
        .with_version(1);
        let completed = match base.end(Utc::now()) {
            Transition::Next(next) => next.with_version(2),
            Transition::Unchanged => panic!("waiting session ends"),
        };

        let mut view = LocalView::default();
        view.reset(HandlePhase::Joining);
        assert!(view.absorb(completed.clone()));
        view.attach(base);
        assert_eq!(view.cached, Some(completed));
        assert_eq!(view.phase, HandlePhase::Ended);
    }
}
