//! In-process session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::{SessionId, SessionState, SessionStore, StoreError};

/// Session store backed by a shared map behind a mutex.
///
/// Clones share the same map, so several coordinators in one process see one
/// authoritative copy of each session.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionState>>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory session store");
        Self::default()
    }

    /// Lists stored session ids.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let sessions = self.lock()?;
        let ids: Vec<_> = sessions.keys().cloned().collect();
        debug!(count = ids.len(), "Listed sessions");
        Ok(ids)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionState>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Session map poisoned: {}", e)))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    #[instrument(skip(self, state), fields(session_id = %state.id()))]
    async fn create(&self, state: SessionState) -> Result<SessionState, StoreError> {
        let mut sessions = self.lock()?;
        if sessions.contains_key(state.id()) {
            warn!("Session already exists");
            return Err(StoreError::AlreadyExists(state.id().clone()));
        }
        let state = state.with_version(0);
        sessions.insert(state.id().clone(), state.clone());
        info!("Session stored");
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn load(&self, session_id: &str) -> Result<SessionState, StoreError> {
        let sessions = self.lock()?;
        let state = sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        debug!(version = state.version(), "Loaded session");
        Ok(state)
    }

    #[instrument(skip(self, new_state))]
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        new_state: SessionState,
    ) -> Result<SessionState, StoreError> {
        StoreError::ensure_same_session(session_id, &new_state)?;
        let mut sessions = self.lock()?;
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        let actual = *stored.version();
        if actual != expected_version {
            warn!(expected_version, actual, "Version conflict");
            return Err(StoreError::VersionConflict {
                session_id: session_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let committed = new_state.with_version(expected_version + 1);
        *stored = committed.clone();
        debug!(version = committed.version(), "Committed session");
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::{SeedableRng, rngs::StdRng};
    use wordhunt_grid::{Category, GridGenerator};

    use crate::Transition;

    fn fresh(id: &str) -> SessionState {
        let words = Category::Colors.word_list();
        let generated =
            GridGenerator::default().generate(12, 12, &words, &mut StdRng::seed_from_u64(1));
        SessionState::new(
            id.to_string(),
            "colors".to_string(),
            words,
            generated,
            "host".to_string(),
            "#123456".to_string(),
            Utc::now(),
        )
    }

    fn joined(state: &SessionState, player: &str) -> SessionState {
        match state.join(player, "#654321").expect("join") {
            Transition::Next(next) => next,
            Transition::Unchanged => panic!("expected a change"),
        }
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let store = MemorySessionStore::new();
        let created = store.create(fresh("s1")).await.expect("create");
        assert_eq!(*created.version(), 0);
        let loaded = store.load("s1").await.expect("load");
        assert_eq!(loaded, created);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = MemorySessionStore::new();
        store.create(fresh("s1")).await.expect("create");
        assert_eq!(
            store.create(fresh("s1")).await,
            Err(StoreError::AlreadyExists("s1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemorySessionStore::new();
        assert_eq!(
            store.load("nope").await,
            Err(StoreError::NotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cas_bumps_version_by_one() {
        let store = MemorySessionStore::new();
        let base = store.create(fresh("s1")).await.expect("create");

        let v1 = store
            .compare_and_swap("s1", 0, joined(&base, "p1"))
            .await
            .expect("cas");
        assert_eq!(*v1.version(), 1);

        let v2 = store
            .compare_and_swap("s1", 1, joined(&v1, "p2"))
            .await
            .expect("cas");
        assert_eq!(*v2.version(), 2);
        assert_eq!(store.load("s1").await.expect("load"), v2);
    }

    #[tokio::test]
    async fn test_stale_cas_is_rejected_and_leaves_state_alone() {
        let store = MemorySessionStore::new();
        let base = store.create(fresh("s1")).await.expect("create");

        let first = joined(&base, "p1");
        let second = joined(&base, "p2");
        store.compare_and_swap("s1", 0, first).await.expect("first writer");

        let err = store
            .compare_and_swap("s1", 0, second)
            .await
            .expect_err("second writer must conflict");
        assert!(err.is_conflict());

        let stored = store.load("s1").await.expect("load");
        assert_eq!(*stored.version(), 1);
        assert!(stored.is_participant("p1"));
        assert!(!stored.is_participant("p2"));
    }

    #[tokio::test]
    async fn test_cas_rejects_candidate_for_another_session() {
        let store = MemorySessionStore::new();
        store.create(fresh("s1")).await.expect("create");
        let other = store.create(fresh("s2")).await.expect("create");

        let err = store
            .compare_and_swap("s1", 0, joined(&other, "p1"))
            .await
            .expect_err("foreign candidate");
        assert_eq!(
            err,
            StoreError::Mismatched {
                session_id: "s1".to_string(),
                candidate: "s2".to_string(),
            }
        );
        let stored = store.load("s1").await.expect("load");
        assert_eq!(stored.id(), "s1");
        assert_eq!(*stored.version(), 0);
    }
}
