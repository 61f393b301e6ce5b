/**
 * Broadcast hub
 *
 * Single intake for change events and single owner of the subscriber set.
 * Every subscriber gets its own bounded queue; fan-out never waits on a
 * queue, so a stalled consumer is disconnected instead of delaying anyone
 * else.
 */
use crate::config::BroadcastConfig;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SubscriberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the hub let go of a subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The outbound queue was full when an event arrived
    Lagged,
    /// Another registration took over the same id
    Replaced,
    /// Removed through `Hub::unregister`
    Unregistered,
    /// The hub shut down
    Shutdown,
}

struct Entry {
    sender: mpsc::Sender<Arc<ChangeEvent>>,
    closed: oneshot::Sender<DisconnectReason>,
}

impl Entry {
    // Dropping the sender lets the receiver drain what is queued, then see `None`
    fn close(self, reason: DisconnectReason) {
        let _ = self.closed.send(reason);
    }
}

/// Transport-side handle of a registered subscriber
pub struct Subscription {
    id: SubscriberId,
    events: mpsc::Receiver<Arc<ChangeEvent>>,
    closed: oneshot::Receiver<DisconnectReason>,
    reason: Option<DisconnectReason>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Next event in enqueue order; `None` once the hub has dropped this
    /// subscriber and the queue is empty
    pub async fn recv(&mut self) -> Option<Arc<ChangeEvent>> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<ChangeEvent>> {
        self.events.try_recv().ok()
    }

    /// Resolves when the hub disconnects this subscriber
    pub async fn closed(&mut self) -> DisconnectReason {
        if let Some(reason) = self.reason {
            return reason;
        }
        // A dropped hub never sends a reason
        let reason = (&mut self.closed)
            .await
            .unwrap_or(DisconnectReason::Shutdown);
        self.reason = Some(reason);
        reason
    }

    /// Non-blocking check of whether the hub has disconnected this subscriber
    pub fn close_reason(&mut self) -> Option<DisconnectReason> {
        if self.reason.is_none() {
            match self.closed.try_recv() {
                Ok(reason) => self.reason = Some(reason),
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.reason = Some(DisconnectReason::Shutdown);
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.reason
    }
}

/// Result of fanning one event out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers dropped during this publish because their queue was full
    pub evicted: Vec<SubscriberId>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<SubscriberId, Entry>,
    closed: bool,
    published: u64,
    evicted: u64,
}

pub struct Hub {
    state: RwLock<HubState>,
    capacity: usize,
    publish_timeout: Duration,
}

impl Hub {
    #[must_use]
    pub fn new(config: &BroadcastConfig) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            capacity: config.subscriber_capacity.max(1),
            publish_timeout: config.publish_timeout,
        }
    }

    /// Register under a fresh id with the default queue capacity
    ///
    /// # Errors
    ///
    /// Returns `Error::HubClosed` after `shutdown`
    pub async fn subscribe(&self) -> Result<Subscription> {
        self.register(SubscriberId::generate()).await
    }

    /// Register under `id`; an existing subscriber with the same id is
    /// replaced and closed with `DisconnectReason::Replaced`
    ///
    /// # Errors
    ///
    /// Returns `Error::HubClosed` after `shutdown`
    pub async fn register(&self, id: SubscriberId) -> Result<Subscription> {
        self.register_with_capacity(id, self.capacity).await
    }

    /// # Errors
    ///
    /// Returns `Error::HubClosed` after `shutdown`
    pub async fn register_with_capacity(
        &self,
        id: SubscriberId,
        capacity: usize,
    ) -> Result<Subscription> {
        let (sender, events) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed) = oneshot::channel();

        let mut state = self.state.write().await;
        if state.closed {
            return Err(Error::HubClosed);
        }
        let entry = Entry {
            sender,
            closed: closed_tx,
        };
        if let Some(prior) = state.subscribers.insert(id.clone(), entry) {
            debug!(subscriber = %id, "Replacing subscriber registered under the same id");
            prior.close(DisconnectReason::Replaced);
        }
        debug!(subscriber = %id, total = state.subscribers.len(), "Subscriber registered");
        drop(state);

        Ok(Subscription {
            id,
            events,
            closed,
            reason: None,
        })
    }

    /// Remove a subscriber. Unknown ids are ignored; returns whether one was removed.
    pub async fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.state.write().await.subscribers.remove(id);
        let Some(entry) = removed else {
            return false;
        };
        debug!(subscriber = %id, "Subscriber unregistered");
        entry.close(DisconnectReason::Unregistered);
        true
    }

    /// Deliver `event` to every registered subscriber.
    ///
    /// Publishes are serialized, so all subscribers observe the same order.
    /// Waits at most the configured publish timeout to enter the hub and
    /// never waits on a subscriber queue.
    ///
    /// # Errors
    ///
    /// Returns `Error::PublishTimeout` if the hub could not be entered in
    /// time and `Error::HubClosed` after `shutdown`
    pub async fn publish(&self, event: ChangeEvent) -> Result<PublishReport> {
        let event = Arc::new(event);
        let mut state = tokio::time::timeout(self.publish_timeout, self.state.write())
            .await
            .map_err(|_| Error::PublishTimeout(self.publish_timeout))?;
        if state.closed {
            return Err(Error::HubClosed);
        }

        let mut report = PublishReport::default();
        let mut gone = Vec::new();
        for (id, entry) in &state.subscribers {
            match entry.sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %id, "Subscriber queue full, disconnecting");
                    report.evicted.push(id.clone());
                    gone.push((id.clone(), DisconnectReason::Lagged));
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, "Subscriber went away, pruning");
                    gone.push((id.clone(), DisconnectReason::Unregistered));
                }
            }
        }

        for (id, reason) in gone {
            if let Some(entry) = state.subscribers.remove(&id) {
                entry.close(reason);
            }
        }
        state.published += 1;
        state.evicted += report.evicted.len() as u64;
        drop(state);

        debug!(
            resource = %event.resource_ref(),
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "Event published"
        );
        Ok(report)
    }

    /// Close every subscriber with `DisconnectReason::Shutdown` and refuse
    /// further registrations and publishes. Returns how many were closed.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.write().await;
        state.closed = true;
        let subscribers = std::mem::take(&mut state.subscribers);
        drop(state);

        let count = subscribers.len();
        for (_, entry) in subscribers {
            entry.close(DisconnectReason::Shutdown);
        }
        info!(closed = count, "Broadcast hub shut down");
        count
    }

    pub async fn active_subscribers(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    pub async fn is_registered(&self, id: &SubscriberId) -> bool {
        self.state.read().await.subscribers.contains_key(id)
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;
        HubStats {
            subscribers: state.subscribers.len(),
            published: state.published,
            evicted: state.evicted,
        }
    }
}
