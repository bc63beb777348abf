//! Publish/subscribe relay between server processes.
//!
//! Publishing puts one envelope on the shared channel. Every process,
//! including the publisher, receives it through its subscription loop and
//! hands it to [`Relay::on_message`], which delivers to whichever members of
//! the named room are connected locally. A process never needs to know
//! which other process holds a session.

use std::sync::Arc;

use pairchat_proto::codec::CodecError;
use pairchat_proto::event::ServerEvent;
use pairchat_proto::relay::{self, RelayEnvelope};
use pairchat_proto::room::{RoomId, SessionId};

use crate::groups::GroupRegistry;
use crate::store::{SharedStore, StoreError, Subscription};

/// Errors that can occur while publishing to the relay channel.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The shared store rejected or could not take the publish.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The envelope could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(#[from] CodecError),
}

/// Publisher and subscriber side of the shared relay channel.
pub struct Relay<S> {
    store: Arc<S>,
    groups: Arc<GroupRegistry>,
    channel: String,
}

impl<S> Clone for Relay<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            groups: Arc::clone(&self.groups),
            channel: self.channel.clone(),
        }
    }
}

impl<S: SharedStore> Relay<S> {
    /// Creates a relay publishing on `channel` and delivering through `groups`.
    pub fn new(store: Arc<S>, groups: Arc<GroupRegistry>, channel: impl Into<String>) -> Self {
        Self {
            store,
            groups,
            channel: channel.into(),
        }
    }

    /// Publishes a chat message for every member of `room`, wherever they
    /// are connected.
    ///
    /// At most once: the envelope is published a single time and never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the envelope cannot be encoded or the store
    /// is unavailable.
    pub async fn publish(&self, room: &RoomId, message: &str) -> Result<(), RelayError> {
        self.send(&RelayEnvelope::Chat {
            room: room.clone(),
            message: message.to_string(),
        })
        .await
    }

    /// Asks whichever process holds `session` to join it to `room` and
    /// notify it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the envelope cannot be encoded or the store
    /// is unavailable.
    pub async fn announce_pairing(
        &self,
        room: &RoomId,
        session: &SessionId,
    ) -> Result<(), RelayError> {
        self.send(&RelayEnvelope::Paired {
            room: room.clone(),
            session: session.clone(),
        })
        .await
    }

    /// Publishes a typing indicator from `from` to the rest of `room`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the envelope cannot be encoded or the store
    /// is unavailable.
    pub async fn publish_typing(&self, room: &RoomId, from: &SessionId) -> Result<(), RelayError> {
        self.send(&RelayEnvelope::Typing {
            room: room.clone(),
            from: from.clone(),
        })
        .await
    }

    async fn send(&self, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        let bytes = relay::encode(envelope)?;
        let reached = self.store.publish(&self.channel, bytes).await?;
        tracing::debug!(channel = %self.channel, subscribers = reached, "envelope published");
        Ok(())
    }

    /// Handles one envelope received from the shared channel.
    ///
    /// Returns the number of local sessions an event was delivered to.
    /// Unknown events and malformed envelopes deliver nothing; malformed ones
    /// are logged.
    pub async fn on_message(&self, raw: &[u8]) -> usize {
        let envelope = match relay::decode(raw) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                tracing::debug!("ignoring envelope with unrecognized event");
                return 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, len = raw.len(), "dropping malformed relay envelope");
                return 0;
            }
        };

        match envelope {
            RelayEnvelope::Chat { room, message } => {
                let delivered = self
                    .groups
                    .deliver_to_group(&room, &ServerEvent::ChatMessage(message), None)
                    .await;
                tracing::debug!(room = %room, delivered, "chat relayed");
                delivered
            }
            RelayEnvelope::Paired { room, session } => {
                if !self.groups.join(&room, &session).await {
                    return 0;
                }
                tracing::info!(session = %session, room = %room, "remote pairing applied");
                usize::from(self.groups.deliver(&session, ServerEvent::Paired(room)).await)
            }
            RelayEnvelope::Typing { room, from } => {
                self.groups
                    .deliver_to_group(&room, &ServerEvent::UserTyping, Some(&from))
                    .await
            }
        }
    }

    /// Subscribes to the relay channel.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.store.subscribe(&self.channel).await
    }

    /// Feeds every envelope from `subscription` to [`Relay::on_message`]
    /// until the subscription closes.
    pub async fn run(self, mut subscription: Subscription) {
        tracing::info!(channel = %self.channel, "relay subscription started");
        while let Some(raw) = subscription.recv().await {
            self.on_message(&raw).await;
        }
        tracing::warn!(channel = %self.channel, "relay subscription closed");
    }

    /// Subscribes and spawns the subscription loop on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the subscription cannot be established.
    pub async fn spawn(&self) -> Result<tokio::task::JoinHandle<()>, StoreError> {
        let subscription = self.subscribe().await?;
        let relay = self.clone();
        Ok(tokio::spawn(relay.run(subscription)))
    }
}
