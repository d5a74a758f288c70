//! Vehicle seam: the flight-control surface the coordination stack drives.

use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{Vector2, Vector3};

/// Error from a vehicle operation.
#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("vehicle rejected command: {0}")]
    Rejected(String),
    #[error("vehicle link failed: {0}")]
    Link(String),
}

/// Flight-control surface consumed by dispatch and navigation. Readbacks are
/// cheap synchronous snapshots; operations may carry vehicle-link latency.
#[async_trait]
pub trait Vehicle: Send + Sync {
    fn ip(&self) -> String;
    fn name(&self) -> String;
    /// Current position, meters in the local frame.
    fn position(&self) -> Vector3<f64>;
    /// Roll, pitch, yaw in radians.
    fn attitude(&self) -> Vector3<f64>;
    /// Angular rates; navigation treats the vehicle as settled when these
    /// are near zero.
    fn attitude_rates(&self) -> Vector3<f64>;
    /// Bounded history of recent horizontal positions, oldest first.
    fn recent_positions(&self) -> Vec<Vector2<f64>>;
    fn target_reached(&self) -> bool;
    /// Last commanded [vx, vy, vz, yaw_rate].
    fn commanded_velocity(&self) -> [f64; 4];
    /// Cadence of the velocity-control loop.
    fn control_period(&self) -> Duration;
    fn max_speed(&self) -> f64;

    async fn send_speed(
        &self,
        vx: f64,
        vy: f64,
        vz: f64,
        yaw_rate: f64,
    ) -> Result<(), VehicleError>;
    async fn goto(&self, x: f64, y: f64, z: f64, yaw: f64) -> Result<(), VehicleError>;
    async fn goto_yaw(&self, yaw: f64) -> Result<(), VehicleError>;
    async fn takeoff(&self) -> Result<(), VehicleError>;
    async fn land(&self) -> Result<(), VehicleError>;
    async fn arm(&self) -> Result<(), VehicleError>;
    async fn disarm(&self) -> Result<(), VehicleError>;
    async fn led_control(&self, led_id: f64, r: f64, g: f64, b: f64) -> Result<(), VehicleError>;
    /// Switch the flight controller into velocity-command mode.
    async fn set_velocity_mode(&self) -> Result<(), VehicleError>;
}
