//! Shared store abstraction: atomic list primitives plus pub/sub.
//!
//! The [`SharedStore`] trait is everything the matchmaker and relay need from
//! the out-of-process store that coordinates server processes. Each list
//! operation must be atomic with respect to every other caller of the same
//! store, across processes.
//!
//! [`MemoryStore`] implements the trait in memory. Several server instances
//! sharing one `Arc<MemoryStore>` behave like several processes sharing one
//! external store. [`crate::redis_store::RedisStore`] is the external store.

use std::collections::{HashMap, VecDeque};
use std::future::Future;

use tokio::sync::{RwLock, mpsc};

/// Receiving half of a channel subscription; yields published payloads in
/// publish order.
pub type Subscription = mpsc::UnboundedReceiver<Vec<u8>>;

/// Errors returned by a [`SharedStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached; the operation did not take effect.
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic list and pub/sub primitives of the shared store.
pub trait SharedStore: Send + Sync + 'static {
    /// Removes and returns the first element of the list at `key`.
    fn pop_front(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Appends `value` to the list at `key`, returning the new length.
    fn push_back(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Prepends `value` to the list at `key`, returning the new length.
    ///
    /// Used to hand a popped element back when the pop could not be acted on.
    fn push_front(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Removes the first occurrence of `value` from the list at `key`.
    ///
    /// Returns the number of elements removed (0 or 1). Removing an absent
    /// value is not an error.
    fn remove_value(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Publishes `payload` to every subscriber of `channel`, returning the
    /// number of subscribers reached.
    fn publish(
        &self,
        channel: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Subscribes to `channel`.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

/// In-memory [`SharedStore`].
///
/// Thread-safe via [`RwLock`]. Lists are FIFO queues keyed by name; each
/// channel keeps the senders of its live subscriptions and prunes closed ones
/// on publish.
#[derive(Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current length of the list at `key`.
    pub async fn len(&self, key: &str) -> usize {
        let lists = self.lists.read().await;
        lists.get(key).map_or(0, VecDeque::len)
    }

    /// Returns a snapshot of the list at `key`, front first.
    pub async fn snapshot(&self, key: &str) -> Vec<String> {
        let lists = self.lists.read().await;
        lists
            .get(key)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl SharedStore for MemoryStore {
    async fn pop_front(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut lists = self.lists.write().await;
        let Some(queue) = lists.get_mut(key) else {
            return Ok(None);
        };
        let front = queue.pop_front();
        if queue.is_empty() {
            lists.remove(key);
        }
        drop(lists);
        Ok(front)
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = self.lists.write().await;
        let queue = lists.entry(key.to_string()).or_default();
        queue.push_back(value.to_string());
        let len = queue.len();
        drop(lists);
        Ok(len)
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = self.lists.write().await;
        let queue = lists.entry(key.to_string()).or_default();
        queue.push_front(value.to_string());
        let len = queue.len();
        drop(lists);
        Ok(len)
    }

    async fn remove_value(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut lists = self.lists.write().await;
        let Some(queue) = lists.get_mut(key) else {
            return Ok(0);
        };
        let removed = match queue.iter().position(|v| v == value) {
            Some(index) => {
                queue.remove(index);
                1
            }
            None => 0,
        };
        if queue.is_empty() {
            lists.remove(key);
        }
        drop(lists);
        Ok(removed)
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, StoreError> {
        let mut subscribers = self.subscribers.write().await;
        let Some(senders) = subscribers.get_mut(channel) else {
            return Ok(0);
        };
        senders.retain(|tx| tx.send(payload.clone()).is_ok());
        let reached = senders.len();
        drop(subscribers);
        Ok(reached)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(channel.to_string()).or_default().push(tx);
        drop(subscribers);
        Ok(rx)
    }
}

/// A store whose every operation fails, for exercising outage handling.
#[cfg(test)]
pub(crate) struct UnreachableStore;

#[cfg(test)]
impl SharedStore for UnreachableStore {
    async fn pop_front(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn push_back(&self, _key: &str, _value: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn push_front(&self, _key: &str, _value: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn remove_value(&self, _key: &str, _value: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn subscribe(&self, _channel: &str) -> Result<Subscription, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
