//! Push transport that fans committed session states out to subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{SessionId, SessionState};

/// Default per-session buffer of undelivered updates.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A full-state push for one session. Subscribers replace their view with
/// `new_state`; there are no diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    session_id: SessionId,
    new_state: SessionState,
}

impl SessionUpdate {
    /// Wraps a committed state as an update event.
    pub fn new(new_state: SessionState) -> Self {
        Self {
            session_id: new_state.id().clone(),
            new_state,
        }
    }

    /// Unwraps the pushed state.
    pub fn into_state(self) -> SessionState {
        self.new_state
    }
}

/// Callback invoked for every update delivered to a subscription.
pub type UpdateHandler = Arc<dyn Fn(SessionUpdate) + Send + Sync>;

/// Channel failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChannelError {
    /// The transport could not be reached.
    #[display("Channel unavailable: {}", _0)]
    Unavailable(String),
}

impl std::error::Error for ChannelError {}

/// Broadcast transport for committed session states.
///
/// Delivery is at-least-once for the latest committed state. A subscriber
/// never receives a version older than one it has already received.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Pushes a committed state to every subscriber of its session.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the transport is down.
    async fn publish(&self, state: &SessionState) -> Result<(), ChannelError>;

    /// Registers `on_update` for pushes on `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unavailable`] if the transport is down.
    async fn subscribe(
        &self,
        session_id: &str,
        on_update: UpdateHandler,
    ) -> Result<Subscription, ChannelError>;
}

/// Handle for an active subscription.
///
/// Unsubscribing releases the delivery task, and the session's broadcast
/// topic once its last subscriber is gone. Unsubscribing twice, or dropping
/// an already released handle, does nothing.
#[derive(Debug)]
pub struct Subscription {
    session_id: SessionId,
    task: Option<JoinHandle<()>>,
    topics: Weak<Mutex<Topics>>,
    epoch: u64,
}

impl Subscription {
    /// Session this subscription listens to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns `true` until [`Subscription::unsubscribe`] is called.
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stops delivery and releases the transport resources.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub fn unsubscribe(&mut self) {
        if self.release() {
            debug!("Unsubscribed");
        } else {
            debug!("Already unsubscribed");
        }
    }

    fn release(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        task.abort();
        if let Some(topics) = self.topics.upgrade() {
            topics
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .leave(&self.session_id, self.epoch);
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// One session's broadcast sender and the number of live subscriptions on
/// it.
#[derive(Debug)]
struct Topic {
    sender: broadcast::Sender<SessionUpdate>,
    subscribers: usize,
    epoch: u64,
}

/// Open topics keyed by session. `opened` numbers topics so a handle from a
/// closed topic never releases a newer one for the same session.
#[derive(Debug, Default)]
struct Topics {
    by_session: HashMap<SessionId, Topic>,
    opened: u64,
}

impl Topics {
    fn join(&mut self, session_id: &str, capacity: usize) -> (broadcast::Receiver<SessionUpdate>, u64) {
        let opened = &mut self.opened;
        let topic = self
            .by_session
            .entry(session_id.to_string())
            .or_insert_with(|| {
                *opened += 1;
                Topic {
                    sender: broadcast::channel(capacity).0,
                    subscribers: 0,
                    epoch: *opened,
                }
            });
        topic.subscribers += 1;
        (topic.sender.subscribe(), topic.epoch)
    }

    fn leave(&mut self, session_id: &str, epoch: u64) {
        let idle = match self.by_session.get_mut(session_id) {
            Some(topic) if topic.epoch == epoch => {
                topic.subscribers = topic.subscribers.saturating_sub(1);
                topic.subscribers == 0
            }
            _ => false,
        };
        if idle {
            self.by_session.remove(session_id);
            debug!(session_id, "Closed idle topic");
        }
    }
}

/// In-process [`SyncChannel`] built on tokio broadcast channels, one per
/// session with live subscribers.
///
/// A topic is opened by the first subscription and closed when the last one
/// is released, or right after a completed state is published.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    capacity: usize,
    topics: Arc<Mutex<Topics>>,
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastChannel {
    /// Creates a channel with the default capacity.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating broadcast sync channel");
        Self::default()
    }

    /// Creates a channel buffering at most `capacity` updates per session.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(Topics::default())),
        }
    }

    /// Current number of live subscriptions on `session_id`.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.by_session.get(session_id).map(|t| t.subscribers))
            .unwrap_or(0)
    }

    /// Number of sessions with an open topic.
    pub fn open_topics(&self) -> usize {
        self.topics
            .lock()
            .map(|topics| topics.by_session.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Topics>, ChannelError> {
        self.topics
            .lock()
            .map_err(|e| ChannelError::Unavailable(format!("Topic map poisoned: {}", e)))
    }
}

#[async_trait]
impl SyncChannel for BroadcastChannel {
    #[instrument(skip(self, state), fields(session_id = %state.id(), version = state.version()))]
    async fn publish(&self, state: &SessionState) -> Result<(), ChannelError> {
        let mut topics = self.lock()?;
        let Some(topic) = topics.by_session.get(state.id()) else {
            debug!("No subscribers, nothing to publish");
            return Ok(());
        };
        match topic.sender.send(SessionUpdate::new(state.clone())) {
            Ok(receivers) => debug!(receivers, "Published update"),
            Err(_) => debug!("Published update with no receivers"),
        }
        if state.status().is_terminal() {
            // Receivers drain the final state, then see the topic closed.
            topics.by_session.remove(state.id());
            debug!("Session completed, topic closed");
        }
        Ok(())
    }

    #[instrument(skip(self, on_update))]
    async fn subscribe(
        &self,
        session_id: &str,
        on_update: UpdateHandler,
    ) -> Result<Subscription, ChannelError> {
        let (mut receiver, epoch) = self.lock()?.join(session_id, self.capacity);
        let id = session_id.to_string();

        let task = tokio::spawn(async move {
            let mut delivered: Option<u64> = None;
            loop {
                match receiver.recv().await {
                    Ok(update) => {
                        let version = *update.new_state().version();
                        if delivered.is_some_and(|last| version <= last) {
                            debug!(session_id = %id, version, "Skipping stale update");
                            continue;
                        }
                        delivered = Some(version);
                        on_update(update);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session_id = %id, skipped, "Subscriber lagged, waiting for newer state");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!("Subscribed");
        Ok(Subscription {
            session_id: session_id.to_string(),
            task: Some(task),
            topics: Arc::downgrade(&self.topics),
            epoch,
        })
    }
}
