//! Session operation errors.

use crate::{ChannelError, PlayerId, SessionId, SessionState, StoreError};

/// Error returned by session transitions and coordinator operations.
///
/// A claim for a word someone else already found is not an error; see
/// [`crate::ClaimOutcome::AlreadyClaimed`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SessionError {
    /// A required field is missing or malformed. Raised before any store
    /// interaction.
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),

    /// No session exists with this id.
    #[display("Session {} not found", _0)]
    NotFound(SessionId),

    /// Every commit attempt lost the version race.
    #[display("Session {} still conflicted after {} commit attempts", session_id, attempts)]
    Congested {
        /// Session that kept conflicting.
        session_id: SessionId,
        /// Number of attempts made.
        attempts: usize,
    },

    /// The session has completed and accepts no further changes.
    #[display("Session {} has ended", _0)]
    SessionClosed(SessionId),

    /// The player has not joined the session.
    #[display("Player {} has not joined this session", _0)]
    NotParticipant(PlayerId),

    /// The local handle is not attached to a session, or already is.
    #[display("Handle is {}, expected {}", actual, expected)]
    WrongPhase {
        /// Phase the operation requires.
        expected: &'static str,
        /// Phase the handle is in.
        actual: &'static str,
    },

    /// The store or the channel could not be reached. Local state is left as
    /// it was.
    #[display("Transport unavailable: {}", _0)]
    TransportUnavailable(String),

    /// The change was committed but the channel refused every publish, so
    /// other participants have not been told. The handle keeps the
    /// committed state.
    #[display("Committed but not published: {}", reason)]
    Unpublished {
        /// State the store accepted.
        state: Box<SessionState>,
        /// Last channel failure.
        reason: String,
    },
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// State the store accepted despite the error, if any.
    pub fn committed_state(&self) -> Option<&SessionState> {
        match self {
            Self::Unpublished { state, .. } => Some(state),
            _ => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::AlreadyExists(id) => {
                Self::InvalidInput(format!("Session {} already exists", id))
            }
            StoreError::Mismatched {
                session_id,
                candidate,
            } => Self::InvalidInput(format!(
                "Replacement for session {} carries id {}",
                session_id, candidate
            )),
            StoreError::VersionConflict { session_id, .. } => Self::Congested {
                session_id,
                attempts: 1,
            },
            StoreError::Unavailable(message) => Self::TransportUnavailable(message),
        }
    }
}

impl From<ChannelError> for SessionError {
    fn from(err: ChannelError) -> Self {
        Self::TransportUnavailable(err.to_string())
    }
}
