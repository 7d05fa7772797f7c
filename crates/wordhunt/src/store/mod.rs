//! Durable holder of session documents with version-checked replacement.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;

use async_trait::async_trait;
use derive_more::Display;

use crate::{DbError, SessionId, SessionState};

/// Storage for one [`SessionState`] per game.
///
/// Writers never edit a stored document. They read it, build a replacement,
/// and hand it to [`SessionStore::compare_and_swap`], which accepts the
/// replacement only if nobody committed in between.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a brand-new session at version 0.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    async fn create(&self, state: SessionState) -> Result<SessionState, StoreError>;

    /// Reads the latest committed state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such session exists.
    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError>;

    /// Atomically replaces the stored state with `new_state` at version
    /// `expected_version + 1`, provided the stored version still equals
    /// `expected_version`. Returns the committed state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if another commit happened
    /// first; the stored state is left untouched. Returns
    /// [`StoreError::Mismatched`] if `new_state` carries another session's
    /// id.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        new_state: SessionState,
    ) -> Result<SessionState, StoreError>;
}

/// Failure reported by a [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreError {
    /// The stored version moved past the expected one.
    #[display(
        "Version conflict on session {}: expected {}, found {}",
        session_id,
        expected,
        actual
    )]
    VersionConflict {
        /// Session being written.
        session_id: SessionId,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// No session with this id.
    #[display("Session {} not found", _0)]
    NotFound(SessionId),

    /// A session with this id already exists.
    #[display("Session {} already exists", _0)]
    AlreadyExists(SessionId),

    /// The replacement document belongs to a different session.
    #[display("Candidate for session {} carries id {}", session_id, candidate)]
    Mismatched {
        /// Session being written.
        session_id: SessionId,
        /// Id found on the candidate.
        candidate: SessionId,
    },

    /// The backing store could not be reached or failed internally.
    #[display("Session store unavailable: {}", _0)]
    Unavailable(String),
}

impl std::error::Error for StoreError {}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl StoreError {
    /// Checks that `candidate` is a replacement for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Mismatched`] when the ids differ.
    pub fn ensure_same_session(session_id: &str, candidate: &SessionState) -> Result<(), Self> {
        if candidate.id() == session_id {
            Ok(())
        } else {
            Err(Self::Mismatched {
                session_id: session_id.to_string(),
                candidate: candidate.id().clone(),
            })
        }
    }

    /// Returns `true` for a lost version race, the one error a writer should
    /// answer by re-reading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
