//! Per-process delivery groups.
//!
//! The [`GroupRegistry`] is the transport side of a room: it knows which
//! sessions are connected to *this* process and which of them have joined
//! which room's delivery group. A room has no record of its own; its group
//! entry disappears when its last local member disconnects.
//!
//! Entries are ephemeral, lost on restart along with the connections they
//! describe.

use std::collections::{HashMap, HashSet};

use pairchat_proto::event::ServerEvent;
use pairchat_proto::room::{RoomId, SessionId};
use tokio::sync::{RwLock, mpsc};

/// Sending half of a session's outbound event channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Connected sessions and their delivery-group memberships.
///
/// Thread-safe via [`RwLock`]. `join` and `disconnect` hold the connection
/// map while they touch the group map, always locking connections first, so
/// a group never keeps a session that has disconnected.
#[derive(Default)]
pub struct GroupRegistry {
    connections: RwLock<HashMap<SessionId, EventSender>>,
    groups: RwLock<HashMap<RoomId, HashSet<SessionId>>>,
}

impl GroupRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connected session, storing the sender half of its
    /// outbound channel.
    ///
    /// Returns the previous sender if the id was already registered.
    pub async fn connect(&self, session: &SessionId, sender: EventSender) -> Option<EventSender> {
        let mut conns = self.connections.write().await;
        conns.insert(session.clone(), sender)
    }

    /// Forgets a session and removes it from every group it joined.
    ///
    /// Groups left without members are dropped. Returns the rooms the
    /// session was a member of.
    pub async fn disconnect(&self, session: &SessionId) -> Vec<RoomId> {
        let mut conns = self.connections.write().await;
        conns.remove(session);

        let mut groups = self.groups.write().await;
        let mut left = Vec::new();
        groups.retain(|room, members| {
            if members.remove(session) {
                left.push(room.clone());
            }
            !members.is_empty()
        });
        drop(groups);
        drop(conns);
        left
    }

    /// Returns `true` if the session is connected to this process.
    pub async fn is_connected(&self, session: &SessionId) -> bool {
        self.connections.read().await.contains_key(session)
    }

    /// Adds a connected session to a room's delivery group.
    ///
    /// Returns `false` without joining if the session is not connected here.
    pub async fn join(&self, room: &RoomId, session: &SessionId) -> bool {
        let conns = self.connections.read().await;
        if !conns.contains_key(session) {
            return false;
        }
        let mut groups = self.groups.write().await;
        groups
            .entry(room.clone())
            .or_default()
            .insert(session.clone());
        drop(groups);
        drop(conns);
        true
    }

    /// Returns `true` if the session has joined the room's delivery group.
    pub async fn is_member(&self, room: &RoomId, session: &SessionId) -> bool {
        let groups = self.groups.read().await;
        groups.get(room).is_some_and(|m| m.contains(session))
    }

    /// Returns the local members of a room, in no particular order.
    pub async fn members(&self, room: &RoomId) -> Vec<SessionId> {
        let groups = self.groups.read().await;
        groups
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Delivers an event to a single connected session.
    ///
    /// Returns `false` if the session is unknown or its channel is closed.
    pub async fn deliver(&self, session: &SessionId, event: ServerEvent) -> bool {
        let sender = self.connections.read().await.get(session).cloned();
        sender.is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Delivers an event to every local member of a room, optionally
    /// skipping one session.
    ///
    /// Returns the number of sessions the event was handed to.
    pub async fn deliver_to_group(
        &self,
        room: &RoomId,
        event: &ServerEvent,
        except: Option<&SessionId>,
    ) -> usize {
        let members = self.members(room).await;
        if members.is_empty() {
            return 0;
        }

        let conns = self.connections.read().await;
        members
            .iter()
            .filter(|member| Some(*member) != except)
            .filter_map(|member| conns.get(member))
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Returns the number of sessions connected to this process.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns the number of non-empty delivery groups.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}
