//! Volans agent: UDP broadcast transport, neighbor tracking, command
//! dispatch, and swarm-aware navigation around a pluggable vehicle backend.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod navigator;
pub mod sim;
pub mod transport;
pub mod vehicle;

pub use config::Config;
pub use coordinator::{CoordinatorError, SwarmCoordinator};
pub use navigator::{Navigator, DEFAULT_ACCURACY};
pub use sim::{SimCall, SimVehicle};
pub use transport::{Broadcaster, Listener, TransportError};
pub use vehicle::{Vehicle, VehicleError};
