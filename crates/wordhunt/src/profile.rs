//! Identity lookup used when a player joins a game.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{DbError, GameRepository, PlayerId, StoreError};

/// Public profile of a player as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    id: PlayerId,
    username: String,
    highlight_color: Option<String>,
}

impl Profile {
    /// Highlight color, or `fallback` when the profile has none.
    pub fn color_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.highlight_color.as_deref().unwrap_or(fallback)
    }
}

/// Source of player profiles.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Looks up a profile. `Ok(None)` means the player has no profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the directory cannot be
    /// reached.
    async fn profile(&self, player_id: &str) -> Result<Option<Profile>, StoreError>;
}

/// In-process profile directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfiles {
    profiles: Arc<RwLock<HashMap<PlayerId, Profile>>>,
}

impl MemoryProfiles {
    /// Creates an empty directory.
    #[instrument]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    #[instrument(skip(self, profile), fields(player_id = %profile.id()))]
    pub fn insert(&self, profile: Profile) -> Result<(), StoreError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Profile map poisoned: {}", e)))?;
        profiles.insert(profile.id().clone(), profile);
        debug!("Profile stored");
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryProfiles {
    #[instrument(skip(self))]
    async fn profile(&self, player_id: &str) -> Result<Option<Profile>, StoreError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Profile map poisoned: {}", e)))?;
        Ok(profiles.get(player_id).cloned())
    }
}

#[async_trait]
impl ProfileDirectory for GameRepository {
    #[instrument(skip(self))]
    async fn profile(&self, player_id: &str) -> Result<Option<Profile>, StoreError> {
        let repo = self.clone();
        let id = player_id.to_string();
        let user = tokio::task::spawn_blocking(move || repo.get_user(&id))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Profile task failed: {}", e)))?
            .map_err(|e: DbError| StoreError::from(e))?;

        if let Some(ref user) = user {
            info!(username = %user.username(), "Profile found");
        }
        Ok(user.map(|user| user.to_profile()))
    }
}
