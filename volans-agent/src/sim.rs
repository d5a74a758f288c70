//! Software-in-the-loop vehicle: integrates commanded velocity one model
//! step per command and records every operation for assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{Vector2, Vector3};
use parking_lot::Mutex;

use volans_core::geom::limit_speed;

use crate::vehicle::{Vehicle, VehicleError};

const RECENT_CAP: usize = 16;
const TAKEOFF_ALTITUDE: f64 = 1.5;

/// Everything a sim vehicle did, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    SendSpeed(f64, f64, f64, f64),
    Goto(f64, f64, f64, f64),
    GotoYaw(f64),
    Takeoff,
    Land,
    Arm,
    Disarm,
    LedControl(f64, f64, f64, f64),
    SetVelocityMode,
}

#[derive(Debug)]
struct SimState {
    position: Vector3<f64>,
    attitude: Vector3<f64>,
    attitude_rates: Vector3<f64>,
    commanded: [f64; 4],
    recent: VecDeque<Vector2<f64>>,
    target_reached: bool,
    velocity_mode: bool,
    armed: bool,
    calls: Vec<SimCall>,
}

/// In-process vehicle model. `model_dt` seconds of flight are integrated per
/// `send_speed`, while real pacing follows `control_period`, so tests can
/// run the model faster than wall-clock flight.
pub struct SimVehicle {
    name: String,
    ip: String,
    max_speed: f64,
    control_period: Duration,
    model_dt: f64,
    failing: AtomicBool,
    state: Mutex<SimState>,
}

impl SimVehicle {
    pub fn new(name: &str, ip: &str) -> Self {
        let position = Vector3::zeros();
        SimVehicle {
            name: name.to_string(),
            ip: ip.to_string(),
            max_speed: 1.0,
            control_period: Duration::from_millis(50),
            model_dt: 0.05,
            failing: AtomicBool::new(false),
            state: Mutex::new(SimState {
                position,
                attitude: Vector3::zeros(),
                attitude_rates: Vector3::zeros(),
                commanded: [0.0; 4],
                recent: VecDeque::from(vec![position.xy()]),
                target_reached: false,
                velocity_mode: false,
                armed: false,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_position(self, position: Vector3<f64>) -> Self {
        {
            let mut state = self.state.lock();
            state.position = position;
            state.recent.clear();
            state.recent.push_back(position.xy());
        }
        self
    }

    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Real pacing of the control loop; shorten to warp test time.
    pub fn with_control_period(mut self, period: Duration) -> Self {
        self.control_period = period;
        self
    }

    /// Make every subsequent operation return an error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn armed(&self) -> bool {
        self.state.lock().armed
    }

    pub fn velocity_mode(&self) -> bool {
        self.state.lock().velocity_mode
    }

    /// Copy of the recorded operations, in call order.
    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: SimCall) -> Result<(), VehicleError> {
        self.state.lock().calls.push(call);
        if self.failing.load(Ordering::Relaxed) {
            Err(VehicleError::Rejected("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Vehicle for SimVehicle {
    fn ip(&self) -> String {
        self.ip.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn position(&self) -> Vector3<f64> {
        self.state.lock().position
    }

    fn attitude(&self) -> Vector3<f64> {
        self.state.lock().attitude
    }

    fn attitude_rates(&self) -> Vector3<f64> {
        self.state.lock().attitude_rates
    }

    fn recent_positions(&self) -> Vec<Vector2<f64>> {
        self.state.lock().recent.iter().copied().collect()
    }

    fn target_reached(&self) -> bool {
        self.state.lock().target_reached
    }

    fn commanded_velocity(&self) -> [f64; 4] {
        self.state.lock().commanded
    }

    fn control_period(&self) -> Duration {
        self.control_period
    }

    fn max_speed(&self) -> f64 {
        self.max_speed
    }

    async fn send_speed(
        &self,
        vx: f64,
        vy: f64,
        vz: f64,
        yaw_rate: f64,
    ) -> Result<(), VehicleError> {
        self.record(SimCall::SendSpeed(vx, vy, vz, yaw_rate))?;
        let mut state = self.state.lock();
        state.commanded = [vx, vy, vz, yaw_rate];
        let horizontal = limit_speed(Vector2::new(vx, vy), self.max_speed);
        state.position.x += horizontal.x * self.model_dt;
        state.position.y += horizontal.y * self.model_dt;
        state.position.z += vz * self.model_dt;
        state.attitude.z += yaw_rate * self.model_dt;
        state.target_reached = false;
        let sample = state.position.xy();
        if state.recent.len() == RECENT_CAP {
            state.recent.pop_front();
        }
        state.recent.push_back(sample);
        Ok(())
    }

    async fn goto(&self, x: f64, y: f64, z: f64, yaw: f64) -> Result<(), VehicleError> {
        self.record(SimCall::Goto(x, y, z, yaw))?;
        let mut state = self.state.lock();
        state.position = Vector3::new(x, y, z);
        state.attitude.z = yaw;
        state.recent.clear();
        state.recent.push_back(Vector2::new(x, y));
        state.target_reached = true;
        Ok(())
    }

    async fn goto_yaw(&self, yaw: f64) -> Result<(), VehicleError> {
        self.record(SimCall::GotoYaw(yaw))?;
        self.state.lock().attitude.z = yaw;
        Ok(())
    }

    async fn takeoff(&self) -> Result<(), VehicleError> {
        self.record(SimCall::Takeoff)?;
        let mut state = self.state.lock();
        state.position.z = TAKEOFF_ALTITUDE;
        Ok(())
    }

    async fn land(&self) -> Result<(), VehicleError> {
        self.record(SimCall::Land)?;
        let mut state = self.state.lock();
        state.position.z = 0.0;
        state.armed = false;
        Ok(())
    }

    async fn arm(&self) -> Result<(), VehicleError> {
        self.record(SimCall::Arm)?;
        self.state.lock().armed = true;
        Ok(())
    }

    async fn disarm(&self) -> Result<(), VehicleError> {
        self.record(SimCall::Disarm)?;
        self.state.lock().armed = false;
        Ok(())
    }

    async fn led_control(&self, led_id: f64, r: f64, g: f64, b: f64) -> Result<(), VehicleError> {
        self.record(SimCall::LedControl(led_id, r, g, b))
    }

    async fn set_velocity_mode(&self) -> Result<(), VehicleError> {
        self.record(SimCall::SetVelocityMode)?;
        self.state.lock().velocity_mode = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_speed_integrates_one_step() {
        let sim = SimVehicle::new("1", "10.0.0.1");
        sim.send_speed(1.0, 0.0, 0.0, 0.0).await.unwrap();
        let pos = sim.position();
        assert!((pos.x - 0.05).abs() < 1e-12);
        assert_eq!(sim.commanded_velocity(), [1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn horizontal_speed_is_clamped_to_max() {
        let sim = SimVehicle::new("1", "10.0.0.1").with_max_speed(1.0);
        sim.send_speed(10.0, 0.0, 0.0, 0.0).await.unwrap();
        // 10 m/s commanded, 1 m/s flown
        assert!((sim.position().x - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn recent_positions_are_bounded() {
        let sim = SimVehicle::new("1", "10.0.0.1");
        for _ in 0..(RECENT_CAP * 2) {
            sim.send_speed(0.1, 0.0, 0.0, 0.0).await.unwrap();
        }
        assert_eq!(sim.recent_positions().len(), RECENT_CAP);
    }

    #[tokio::test]
    async fn goto_teleports_and_flags_reached() {
        let sim = SimVehicle::new("1", "10.0.0.1");
        sim.goto(2.0, 3.0, 1.0, 0.5).await.unwrap();
        assert_eq!(sim.position(), Vector3::new(2.0, 3.0, 1.0));
        assert!(sim.target_reached());
        sim.send_speed(0.1, 0.0, 0.0, 0.0).await.unwrap();
        assert!(!sim.target_reached());
    }

    #[tokio::test]
    async fn injected_failure_still_records_the_call() {
        let sim = SimVehicle::new("1", "10.0.0.1");
        sim.set_failing(true);
        assert!(sim.arm().await.is_err());
        assert_eq!(sim.calls(), vec![SimCall::Arm]);
        assert!(!sim.armed());
        sim.set_failing(false);
        sim.arm().await.unwrap();
        assert!(sim.armed());
    }

    #[tokio::test]
    async fn arm_land_cycle() {
        let sim = SimVehicle::new("1", "10.0.0.1");
        sim.arm().await.unwrap();
        sim.takeoff().await.unwrap();
        assert!(sim.armed());
        assert!(sim.position().z > 0.0);
        sim.land().await.unwrap();
        assert_eq!(sim.position().z, 0.0);
        assert!(!sim.armed());
    }
}
