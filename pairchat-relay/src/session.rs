//! Per-session pairing state.
//!
//! Each connection's actor owns one [`SessionPhase`]. Transitions only move
//! forward: `Idle → Waiting → Paired`, or straight from `Idle` to `Paired`
//! when a waiter is found. A session never returns to `Waiting` once paired.

use pairchat_proto::event::ServerEvent;
use pairchat_proto::room::RoomId;

use crate::matchmaker::PairingOutcome;

/// Where a session stands relative to the matchmaker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, has not asked to be paired (or the last request failed).
    #[default]
    Idle,
    /// In the waiting queue.
    Waiting,
    /// Paired into a room.
    Paired(RoomId),
}

impl SessionPhase {
    /// Returns `true` if a `join-room` request should reach the matchmaker.
    ///
    /// Requests from waiting or paired sessions are redundant and dropped.
    #[must_use]
    pub const fn accepts_join(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns the room this session was paired into, if any.
    #[must_use]
    pub const fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Paired(room) => Some(room),
            Self::Idle | Self::Waiting => None,
        }
    }

    /// Applies the outcome of this session's own pairing request.
    pub fn apply(&mut self, outcome: &PairingOutcome) {
        match outcome {
            PairingOutcome::Waiting => {
                if matches!(self, Self::Idle) {
                    *self = Self::Waiting;
                }
            }
            PairingOutcome::Paired { room, .. } => *self = Self::Paired(room.clone()),
        }
    }

    /// Updates the phase from an event about to be delivered to this session.
    ///
    /// A waiting session learns it was matched only through its `paired`
    /// event.
    pub fn observe(&mut self, event: &ServerEvent) {
        if let ServerEvent::Paired(room) = event
            && !matches!(self, Self::Paired(_))
        {
            *self = Self::Paired(room.clone());
        }
    }
}
