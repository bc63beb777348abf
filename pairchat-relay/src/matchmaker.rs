//! Matchmaking over the shared waiting queue.
//!
//! A pairing request pops the longest-waiting session from the queue. If
//! there is one, the two sessions form a room; otherwise the requester is
//! appended and waits. The pop is the store's atomic primitive, which is
//! the only thing preventing two processes from matching the same waiter.

use std::sync::Arc;

use pairchat_proto::event::ServerEvent;
use pairchat_proto::room::{RoomId, SessionId};

use crate::groups::GroupRegistry;
use crate::relay::{Relay, RelayError};
use crate::store::{SharedStore, StoreError};

/// Errors that abort a pairing request.
///
/// After any of them the requester is neither paired nor queued.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// The waiting queue could not be popped or pushed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The waiter is held by another process and could not be told about
    /// the room. It was handed back to the front of the queue.
    #[error("pairing announcement failed: {0}")]
    Announce(#[from] RelayError),
}

/// Result of a pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// No one was waiting; the requester is now at the back of the queue.
    Waiting,
    /// The requester was matched with a waiting session.
    Paired {
        /// The room that was formed.
        room: RoomId,
        /// The waiting session the requester was matched with.
        peer: SessionId,
    },
}

/// Pairs sessions through the shared waiting queue.
pub struct Matchmaker<S> {
    store: Arc<S>,
    groups: Arc<GroupRegistry>,
    relay: Relay<S>,
    queue_key: String,
}

impl<S: SharedStore> Matchmaker<S> {
    /// Creates a matchmaker over the queue stored at `queue_key`.
    pub fn new(
        store: Arc<S>,
        groups: Arc<GroupRegistry>,
        relay: Relay<S>,
        queue_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            groups,
            relay,
            queue_key: queue_key.into(),
        }
    }

    /// Pairs `session` with the longest-waiting session, or queues it.
    ///
    /// On a match both sessions join the room's delivery group and receive
    /// `paired`. The requester is always local; a waiter connected to another
    /// process is reached through a pairing announcement on the relay
    /// channel, published before anything is committed locally.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::Store`] if the queue could not be popped or
    /// pushed, and [`PairingError::Announce`] if a remote waiter could not be
    /// notified. The requester is then neither paired nor queued and may
    /// retry.
    pub async fn request_pairing(
        &self,
        session: &SessionId,
    ) -> Result<PairingOutcome, PairingError> {
        let Some(candidate) = self.store.pop_front(&self.queue_key).await? else {
            return Ok(self.enqueue(session).await?);
        };
        let candidate = SessionId::new(candidate);

        if candidate == *session {
            tracing::warn!(session = %session, "popped own stale queue entry, re-queueing");
            return Ok(self.enqueue(session).await?);
        }

        let room = RoomId::for_pair(session, &candidate);
        let candidate_is_local = self.groups.join(&room, &candidate).await;
        if !candidate_is_local
            && let Err(e) = self.relay.announce_pairing(&room, &candidate).await
        {
            tracing::warn!(
                session = %session,
                peer = %candidate,
                room = %room,
                error = %e,
                "failed to announce pairing to remote peer"
            );
            self.restore(&candidate).await;
            return Err(e.into());
        }

        self.groups.join(&room, session).await;
        self.groups
            .deliver(session, ServerEvent::Paired(room.clone()))
            .await;
        if candidate_is_local {
            self.groups
                .deliver(&candidate, ServerEvent::Paired(room.clone()))
                .await;
        }

        tracing::info!(session = %session, peer = %candidate, room = %room, "sessions paired");
        Ok(PairingOutcome::Paired {
            room,
            peer: candidate,
        })
    }

    /// Hands a popped waiter back to the front of the queue.
    async fn restore(&self, waiter: &SessionId) {
        if let Err(e) = self.store.push_front(&self.queue_key, waiter.as_str()).await {
            tracing::warn!(
                session = %waiter,
                error = %e,
                "could not return waiter to the queue, it must rejoin"
            );
        }
    }

    async fn enqueue(&self, session: &SessionId) -> Result<PairingOutcome, StoreError> {
        let len = self
            .store
            .push_back(&self.queue_key, session.as_str())
            .await?;
        tracing::info!(session = %session, queue_len = len, "session added to waiting queue");
        Ok(PairingOutcome::Waiting)
    }

    /// Removes `session` from the waiting queue if it is still there.
    ///
    /// Idempotent. Returns `true` if an entry was removed. Rooms the session
    /// already formed are left to the delivery groups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unavailable; the entry, if any,
    /// is then left behind.
    pub async fn cleanup(&self, session: &SessionId) -> Result<bool, StoreError> {
        let removed = self
            .store
            .remove_value(&self.queue_key, session.as_str())
            .await?;
        if removed > 0 {
            tracing::info!(session = %session, "session removed from waiting queue");
        }
        Ok(removed > 0)
    }
}
