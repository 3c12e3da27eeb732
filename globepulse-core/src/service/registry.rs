//! Connection registry: the authoritative set of currently-connected
//! sessions and their position records.
//!
//! The registry is a plain data structure with no I/O. Linearization of
//! `admit`/`remove`/`snapshot` is provided by its single owner, the
//! presence hub actor.

use indexmap::IndexMap;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::models::{OutgoingMessage, Position, SessionId};

/// Message sender for one connected peer. Sending never blocks; it fails
/// only once the peer's receiving half is gone.
pub type PeerSender = mpsc::UnboundedSender<OutgoingMessage>;

/// One admitted session: its immutable position record and the channel
/// used to deliver roster deltas to it.
#[derive(Debug)]
pub struct Session {
    position: Position,
    sender: PeerSender,
}

impl Session {
    #[must_use]
    pub const fn position(&self) -> &Position {
        &self.position
    }

    /// Deliver a message to this peer. An error means the peer is gone
    /// and should be passed to the disconnect protocol.
    pub fn send(&self, message: OutgoingMessage) -> std::result::Result<(), SendFailed> {
        self.sender.send(message).map_err(|_| SendFailed)
    }
}

/// Marker for a failed peer delivery; carries no payload because the
/// undelivered message is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendFailed;

/// Authoritative roster of live sessions, enumerated in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: IndexMap<SessionId, Session>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session keyed by its position's id.
    ///
    /// A duplicate id is an invariant violation under correct transport
    /// id assignment, not a retryable condition.
    pub fn admit(&mut self, position: Position, sender: PeerSender) -> Result<()> {
        let id = position.id.clone();
        if self.sessions.contains_key(&id) {
            return Err(Error::DuplicateSession(id));
        }
        self.sessions.insert(id, Session { position, sender });
        Ok(())
    }

    /// Remove a session. Idempotent: removing an absent id is a no-op
    /// and returns `None`.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.shift_remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Snapshot of all admitted positions, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        self.sessions
            .values()
            .map(|s| s.position().clone())
            .collect()
    }

    /// Iterate live sessions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &Session)> {
        self.sessions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
