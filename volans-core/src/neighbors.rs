//! Last-write-wins cache of peer poses, shared between the receive path and
//! the navigation loop.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use nalgebra::{Vector2, Vector3};
use parking_lot::RwLock;

use crate::identity::AgentId;
use crate::protocol::HeartbeatPose;

/// Last known state of one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerState {
    pub id: AgentId,
    pub ip: Ipv4Addr,
    pub position: Vector3<f64>,
    pub attitude: Vector3<f64>,
    pub updated_at: Instant,
}

/// When a peer entry is considered expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep entries for the life of the store.
    #[default]
    Never,
    /// Drop entries not refreshed within the window.
    StaleAfter(Duration),
}

/// Concurrent id -> `PeerState` map. Writers overwrite whole entries
/// (last-write-wins per id, no cross-key atomicity); readers take
/// point-in-time copies. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct NeighborStore {
    peers: RwLock<HashMap<AgentId, PeerState>>,
}

impl NeighborStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the state tracked for `id`.
    pub fn upsert(&self, id: AgentId, pose: &HeartbeatPose) {
        let state = PeerState {
            id,
            ip: pose.ip,
            position: pose.position,
            attitude: pose.attitude,
            updated_at: Instant::now(),
        };
        self.peers.write().insert(id, state);
    }

    /// Refresh the liveness timestamp of an already-tracked peer. Unknown
    /// ids are ignored so command traffic cannot fabricate a zero pose.
    pub fn touch(&self, id: AgentId) {
        if let Some(entry) = self.peers.write().get_mut(&id) {
            entry.updated_at = Instant::now();
        }
    }

    pub fn get(&self, id: AgentId) -> Option<PeerState> {
        self.peers.read().get(&id).cloned()
    }

    /// Point-in-time copy of every tracked peer.
    pub fn snapshot(&self) -> Vec<PeerState> {
        self.peers.read().values().cloned().collect()
    }

    /// Horizontal positions of every tracked peer, the avoidance law input.
    pub fn horizontal_positions(&self) -> Vec<Vector2<f64>> {
        self.peers.read().values().map(|p| p.position.xy()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Apply `policy`, dropping entries whose last update fell outside its
    /// window. Returns how many entries were removed.
    pub fn prune(&self, policy: EvictionPolicy) -> usize {
        match policy {
            EvictionPolicy::Never => 0,
            EvictionPolicy::StaleAfter(window) => {
                let now = Instant::now();
                let mut peers = self.peers.write();
                let before = peers.len();
                peers.retain(|_, peer| now.duration_since(peer.updated_at) <= window);
                before - peers.len()
            }
        }
    }
}
