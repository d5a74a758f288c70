//! Avoidance navigation: fly to a point while repelling from tracked peers.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Vector2;
use tracing::{debug, info};

use volans_core::avoidance::compute_swarm_velocity;
use volans_core::geom::target_reached;
use volans_core::neighbors::NeighborStore;

use crate::vehicle::{Vehicle, VehicleError};

/// Default settle tolerance, meters.
pub const DEFAULT_ACCURACY: f64 = 0.05;

/// Angular rates below this count as settled, rad/s.
const RATE_SETTLED: f64 = 0.01;

/// Pause at zero velocity after reaching the target.
const HOLD_AFTER_REACH: Duration = Duration::from_millis(500);

/// Drives the vehicle toward targets using the swarm velocity law over the
/// live neighbor cache. One instance serves both caller-initiated and
/// network-triggered navigation.
pub struct Navigator {
    vehicle: Arc<dyn Vehicle>,
    store: Arc<NeighborStore>,
    safety_radius: f64,
}

impl Navigator {
    pub fn new(vehicle: Arc<dyn Vehicle>, store: Arc<NeighborStore>, safety_radius: f64) -> Self {
        Navigator {
            vehicle,
            store,
            safety_radius,
        }
    }

    /// Fly to (x, y), yawing to `yaw` first. `z` is accepted for interface
    /// parity but the avoidance law is horizontal-only, so vertical velocity
    /// stays zero. Blocks the calling task until the vehicle settles within
    /// `accuracy` of the target, then holds half a second at zero velocity.
    ///
    /// Starting inside `accuracy` performs the yaw alignment and zero
    /// navigation iterations.
    pub async fn smart_goto(
        &self,
        x: f64,
        y: f64,
        z: f64,
        yaw: f64,
        accuracy: f64,
    ) -> Result<(), VehicleError> {
        let _ = z;
        info!(x, y, yaw, "smart goto");
        self.vehicle.set_velocity_mode().await?;
        self.vehicle.goto_yaw(yaw).await?;

        let target = Vector2::new(x, y);
        let tick = self.vehicle.control_period();
        let max_speed = self.vehicle.max_speed();
        while !self.settled(target, accuracy) {
            let velocity = compute_swarm_velocity(
                self.vehicle.position().xy(),
                &self.store.horizontal_positions(),
                target,
                self.safety_radius,
                max_speed,
            );
            self.vehicle
                .send_speed(velocity.x, velocity.y, 0.0, 0.0)
                .await?;
            tokio::time::sleep(tick).await;
        }

        self.vehicle.send_speed(0.0, 0.0, 0.0, 0.0).await?;
        tokio::time::sleep(HOLD_AFTER_REACH).await;
        debug!(x, y, "smart goto settled");
        Ok(())
    }

    /// Settled means the recent-position mean sits within `accuracy` of the
    /// target and the vehicle has stopped rotating.
    fn settled(&self, target: Vector2<f64>, accuracy: f64) -> bool {
        let rates = self.vehicle.attitude_rates();
        if rates.iter().any(|r| r.abs() >= RATE_SETTLED) {
            return false;
        }
        target_reached(target, &self.vehicle.recent_positions(), accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCall, SimVehicle};
    use nalgebra::Vector3;
    use std::net::Ipv4Addr;
    use volans_core::identity::numeric_id;
    use volans_core::protocol::HeartbeatPose;

    fn fast_sim(position: Vector3<f64>) -> Arc<SimVehicle> {
        Arc::new(
            SimVehicle::new("1", "127.0.0.1")
                .with_position(position)
                .with_control_period(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn already_at_target_runs_zero_iterations() {
        let sim = fast_sim(Vector3::new(4.0, 0.0, 0.0));
        let store = Arc::new(NeighborStore::new());
        let nav = Navigator::new(sim.clone(), store, 1.0);

        nav.smart_goto(4.0, 0.0, 0.0, 1.2, DEFAULT_ACCURACY)
            .await
            .unwrap();

        let calls = sim.calls();
        assert_eq!(
            calls,
            vec![
                SimCall::SetVelocityMode,
                SimCall::GotoYaw(1.2),
                SimCall::SendSpeed(0.0, 0.0, 0.0, 0.0),
            ],
            "only the yaw alignment and the terminal zero command may run"
        );
    }

    #[tokio::test]
    async fn reaches_target_with_empty_store() {
        let sim = fast_sim(Vector3::zeros());
        let store = Arc::new(NeighborStore::new());
        let nav = Navigator::new(sim.clone(), store, 1.0);

        tokio::time::timeout(
            Duration::from_secs(10),
            nav.smart_goto(2.0, 1.0, 0.0, 0.0, DEFAULT_ACCURACY),
        )
        .await
        .expect("navigation timed out")
        .unwrap();

        let pos = sim.position();
        let dist = (pos.xy() - Vector2::new(2.0, 1.0)).norm();
        assert!(dist < 0.1, "ended {dist} from target");
        // terminal command parks the vehicle
        assert_eq!(sim.commanded_velocity(), [0.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn detours_around_tracked_neighbor() {
        let sim = fast_sim(Vector3::zeros());
        let store = Arc::new(NeighborStore::new());
        store.upsert(
            numeric_id("9"),
            &HeartbeatPose {
                ip: Ipv4Addr::new(127, 0, 0, 9),
                position: Vector3::new(1.0, 0.0, 0.0),
                attitude: Vector3::zeros(),
            },
        );
        let nav = Navigator::new(sim.clone(), store, 0.5);

        tokio::time::timeout(
            Duration::from_secs(10),
            nav.smart_goto(2.0, 0.0, 0.0, 0.0, DEFAULT_ACCURACY),
        )
        .await
        .expect("navigation timed out")
        .unwrap();

        let pos = sim.position();
        assert!((pos.xy() - Vector2::new(2.0, 0.0)).norm() < 0.1);
        // the flight must have commanded off-axis velocity to sidestep
        let deviated = sim
            .calls()
            .iter()
            .any(|c| matches!(c, SimCall::SendSpeed(_, vy, _, _) if vy.abs() > 1e-3));
        assert!(deviated, "no lateral velocity was ever commanded");
    }

    #[tokio::test]
    async fn vehicle_failure_propagates() {
        let sim = fast_sim(Vector3::zeros());
        sim.set_failing(true);
        let store = Arc::new(NeighborStore::new());
        let nav = Navigator::new(sim, store, 1.0);
        assert!(nav
            .smart_goto(1.0, 0.0, 0.0, 0.0, DEFAULT_ACCURACY)
            .await
            .is_err());
    }
}
