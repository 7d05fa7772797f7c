//! Session data model: the shared document, its ledger entries and the pure
//! transitions that produce candidate states.

mod error;
mod record;
mod state;

pub use error::SessionError;
pub use record::{
    BoardState, DEFAULT_HIGHLIGHT_COLOR, FoundWordRecord, PlayerId, SessionId, SessionStatus,
    WordClaim,
};
pub use state::{ClaimOutcome, SessionState, Transition};
