//! Presence hub: the connect/disconnect protocol.
//!
//! One actor task exclusively owns the registry and the region stats
//! store; every admit, removal, roster enumeration and counter increment
//! goes through its command channel, so a roster snapshot taken during a
//! connect can never observe a half-applied admit or race a removal of
//! the same id.
//!
//! Peer delivery is an unbounded channel send and never blocks the actor.
//! A failed send means the peer's receiving half is gone; that peer is
//! treated as already disconnected and cleaned up through the regular
//! disconnect protocol instead of aborting the remaining fan-out.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{GeoInput, OutgoingMessage, SessionId};
use crate::service::region_stats::RegionStatsStore;
use crate::service::registry::{PeerSender, Registry};

/// Read-only view served by `/api/stats`: current roster size plus the
/// all-time per-region visit counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOverview {
    pub sessions: usize,
    pub regions: HashMap<String, u64>,
}

enum Command {
    Connect {
        id: SessionId,
        geo: GeoInput,
        sender: PeerSender,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        id: SessionId,
    },
    Stats {
        reply: oneshot::Sender<StatsOverview>,
    },
}

/// Clonable handle for submitting lifecycle events to the hub actor.
///
/// The actor drains queued commands and exits once every handle has been
/// dropped, so shutdown is "stop minting handles, let in-flight fan-outs
/// finish".
#[derive(Clone)]
pub struct PresenceHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PresenceHandle {
    /// Run the connect protocol for a newly established connection.
    ///
    /// On success the session is `Active`: admitted to the registry,
    /// announced to every peer, and primed with the existing roster and
    /// the current region stats. `Error::DuplicateSession` rejects this
    /// admission and leaves the existing session untouched.
    pub async fn connect(&self, id: SessionId, geo: GeoInput, sender: PeerSender) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Connect {
                id,
                geo,
                sender,
                reply,
            })
            .map_err(|_| Error::HubClosed)?;
        rx.await.map_err(|_| Error::HubClosed)?
    }

    /// Run the disconnect protocol for a session. Idempotent: unknown or
    /// already-removed ids are ignored, and it is safe to call this for
    /// both the close and the error event of the same connection.
    pub fn disconnect(&self, id: SessionId) {
        // A closed hub is already past the point of caring about peers.
        let _ = self.tx.send(Command::Disconnect { id });
    }

    /// Current roster size and region counters.
    pub async fn stats(&self) -> Result<StatsOverview> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .map_err(|_| Error::HubClosed)?;
        rx.await.map_err(|_| Error::HubClosed)
    }
}

/// The actor that owns the registry and the counter store.
pub struct PresenceHub {
    registry: Registry,
    stats: RegionStatsStore,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl PresenceHub {
    /// Spawn the hub actor. The returned task runs until every
    /// `PresenceHandle` clone has been dropped and all queued commands
    /// have been processed.
    #[must_use]
    pub fn spawn(stats: RegionStatsStore) -> (PresenceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            registry: Registry::new(),
            stats,
            rx,
        };
        let task = tokio::spawn(hub.run());
        (PresenceHandle { tx }, task)
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::Connect {
                    id,
                    geo,
                    sender,
                    reply,
                } => {
                    let result = self.handle_connect(id, geo, sender).await;
                    let _ = reply.send(result);
                }
                Command::Disconnect { id } => self.handle_disconnect(&id),
                Command::Stats { reply } => {
                    let _ = reply.send(StatsOverview {
                        sessions: self.registry.len(),
                        regions: self.stats.snapshot(),
                    });
                }
            }
        }
        info!(sessions = self.registry.len(), "Presence hub drained, shutting down");
    }

    async fn handle_connect(
        &mut self,
        id: SessionId,
        geo: GeoInput,
        sender: PeerSender,
    ) -> Result<()> {
        let counted_region = geo.resolved_region().map(str::to_string);
        let position = geo.into_position(id.clone());
        let region = position.region.clone();
        self.registry.admit(position.clone(), sender).map_err(|e| {
            warn!(session_id = %id, "Rejected duplicate session admission");
            e
        })?;

        // Count the visit before snapshotting the stats, so the
        // newcomer's region-stats include its own region. Unresolved
        // regions are never counted.
        if let Some(region) = counted_region {
            if let Err(e) = self.stats.increment(&region).await {
                warn!(session_id = %id, region = %region, error = %e, "Failed to persist region counter, continuing without it");
            }
        }

        // Symmetric fan-out over a snapshot taken under the actor's
        // exclusive ownership: every peer learns of the newcomer and the
        // newcomer learns of every peer. Self is never sent to self.
        let mut failed = Vec::new();
        let mut newcomer_gone = false;
        {
            let newcomer = self
                .registry
                .get(&id)
                .ok_or_else(|| Error::Internal("freshly admitted session missing".to_string()))?;

            for (peer_id, peer) in self.registry.iter() {
                if *peer_id == id {
                    continue;
                }
                if peer
                    .send(OutgoingMessage::AddMarker {
                        position: position.clone(),
                    })
                    .is_err()
                {
                    failed.push(peer_id.clone());
                }
                if !newcomer_gone
                    && newcomer
                        .send(OutgoingMessage::AddMarker {
                            position: peer.position().clone(),
                        })
                        .is_err()
                {
                    newcomer_gone = true;
                }
            }

            if !newcomer_gone
                && newcomer
                    .send(OutgoingMessage::RegionStats {
                        stats: self.stats.snapshot(),
                    })
                    .is_err()
            {
                newcomer_gone = true;
            }
        }

        if newcomer_gone {
            failed.push(id.clone());
        }
        for peer_id in failed {
            debug!(session_id = %peer_id, "Peer unreachable during fan-out, cascading disconnect");
            self.handle_disconnect(&peer_id);
        }

        info!(session_id = %id, region = %region, sessions = self.registry.len(), "Session connected");
        Ok(())
    }

    /// Remove a session and broadcast its departure. Excludes the
    /// departed session by identifier, never by connection identity, so a
    /// freed-but-not-yet-removed peer can never be told about itself.
    fn handle_disconnect(&mut self, id: &SessionId) {
        if self.registry.remove(id).is_none() {
            // Close and error both fired, or the id was never admitted.
            return;
        }

        let mut failed = Vec::new();
        for (peer_id, peer) in self.registry.iter() {
            if peer_id == id {
                continue;
            }
            if peer
                .send(OutgoingMessage::RemoveMarker { id: id.clone() })
                .is_err()
            {
                warn!(session_id = %peer_id, departed = %id, "Failed to notify peer of departure");
                failed.push(peer_id.clone());
            }
        }
        for peer_id in failed {
            self.handle_disconnect(&peer_id);
        }

        info!(session_id = %id, sessions = self.registry.len(), "Session disconnected");
    }
}
