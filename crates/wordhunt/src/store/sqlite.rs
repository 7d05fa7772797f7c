//! [`SessionStore`] over the SQLite repository.
//!
//! Diesel calls block, so each operation runs on tokio's blocking pool.

use async_trait::async_trait;
use tracing::instrument;

use crate::{GameRepository, SessionState, SessionStore, StoreError};

/// Runs a blocking repository call and flattens join failures into
/// [`StoreError::Unavailable`].
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Store task failed: {}", e)))?
}

#[async_trait]
impl SessionStore for GameRepository {
    #[instrument(skip(self, state), fields(session_id = %state.id()))]
    async fn create(&self, state: SessionState) -> Result<SessionState, StoreError> {
        let repo = self.clone();
        blocking(move || repo.insert_game(&state)).await
    }

    #[instrument(skip(self))]
    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let repo = self.clone();
        let id = session_id.to_string();
        blocking(move || repo.load_game(&id)).await
    }

    #[instrument(skip(self, new_state))]
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        new_state: SessionState,
    ) -> Result<SessionState, StoreError> {
        let repo = self.clone();
        let id = session_id.to_string();
        blocking(move || repo.compare_and_swap_game(&id, expected_version, &new_state)).await
    }
}
