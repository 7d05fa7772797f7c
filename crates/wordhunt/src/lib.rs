//! Wordhunt - shared word-search sessions
//!
//! Several players hunt the same grid at once. Each player's
//! [`SessionCoordinator`] commits changes to one shared [`SessionState`]
//! through a version-checked [`SessionStore`], so concurrent finds never
//! overwrite each other, and every commit is pushed to the other players
//! through a [`SyncChannel`].
//!
//! # Architecture
//!
//! - **Session**: the shared document and its pure transitions
//! - **Store**: compare-and-swap persistence (in-memory or SQLite)
//! - **Channel**: full-state fan-out to subscribers
//! - **Coordinator**: per-player handle running the commit loop
//! - **Profiles**: identity lookup for highlight colors
//!
//! Grid generation lives in the [`wordhunt_grid`] crate.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wordhunt::{
//!     BroadcastChannel, CoordinatorSettings, MemoryProfiles, MemorySessionStore,
//!     SessionCoordinator,
//! };
//! use wordhunt_grid::GridSize;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(MemorySessionStore::new());
//! let channel = Arc::new(BroadcastChannel::new());
//! let profiles = Arc::new(MemoryProfiles::new());
//!
//! let mut host = SessionCoordinator::new(
//!     "host".to_string(),
//!     store,
//!     channel,
//!     profiles,
//!     CoordinatorSettings::default(),
//! );
//! let game = host.create_game("animals", GridSize::new(10, 10)).await?;
//! println!("{}", game.game_state().grid().display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod channel;
mod config;
mod coordinator;
mod profile;
mod session;
mod store;

/// SQLite persistence layer.
pub mod db;

// Crate-level exports - Session model
pub use session::{
    BoardState, ClaimOutcome, DEFAULT_HIGHLIGHT_COLOR, FoundWordRecord, PlayerId, SessionError,
    SessionId, SessionState, SessionStatus, Transition, WordClaim,
};

// Crate-level exports - Storage
pub use db::{DbError, DbErrorKind, GameRepository};
pub use store::{MemorySessionStore, SessionStore, StoreError};

// Crate-level exports - Sync channel
pub use channel::{
    BroadcastChannel, ChannelError, DEFAULT_CHANNEL_CAPACITY, SessionUpdate, Subscription,
    SyncChannel, UpdateHandler,
};

// Crate-level exports - Coordination
pub use coordinator::{HandlePhase, SessionCoordinator};

// Crate-level exports - Profiles
pub use profile::{MemoryProfiles, Profile, ProfileDirectory};

// Crate-level exports - Configuration
pub use config::{ConfigError, CoordinatorSettings, WordhuntConfig};
