//! Volans swarm protocol reference implementation.
//! Pure protocol and math: no sockets, no async; the agent crate drives I/O.

pub mod avoidance;
pub mod geom;
pub mod identity;
pub mod neighbors;
pub mod protocol;
pub mod wire;

pub use avoidance::compute_swarm_velocity;
pub use identity::{numeric_id, AgentId, Identity, IdentityAllocator};
pub use neighbors::{EvictionPolicy, NeighborStore, PeerState};
pub use protocol::{Command, CommandError, Datagram, HeartbeatPose, DEFAULT_PORT};
pub use wire::{decode_datagram, encode_datagram, DatagramDecodeError, DatagramEncodeError};
