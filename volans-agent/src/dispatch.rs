//! Dispatch: one decoded datagram at a time, applying the addressing rules
//! and mapping command codes onto vehicle operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use volans_core::identity::AgentId;
use volans_core::neighbors::NeighborStore;
use volans_core::protocol::{Command, Datagram, HeartbeatPose};

use crate::navigator::{Navigator, DEFAULT_ACCURACY};
use crate::vehicle::Vehicle;

/// Drains the receive queue one datagram per tick. Bounded per-tick work;
/// under bursty arrival the queue grows, which `pending` makes observable.
pub struct Dispatcher {
    self_id: AgentId,
    store: Arc<NeighborStore>,
    vehicle: Arc<dyn Vehicle>,
    navigator: Arc<Navigator>,
    queue: mpsc::UnboundedReceiver<Datagram>,
    pending: Arc<AtomicUsize>,
    tick: Duration,
}

impl Dispatcher {
    pub fn new(
        self_id: AgentId,
        store: Arc<NeighborStore>,
        vehicle: Arc<dyn Vehicle>,
        navigator: Arc<Navigator>,
        queue: mpsc::UnboundedReceiver<Datagram>,
        pending: Arc<AtomicUsize>,
        tick: Duration,
    ) -> Self {
        Dispatcher {
            self_id,
            store,
            vehicle,
            navigator,
            queue,
            pending,
            tick,
        }
    }

    /// Poll the queue until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {
                    if let Ok(dgram) = self.queue.try_recv() {
                        self.pending.fetch_sub(1, Ordering::Relaxed);
                        self.handle(dgram).await;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn handle(&self, dgram: Datagram) {
        // own broadcasts loop back on a broadcast socket
        if dgram.sender_id == self.self_id {
            return;
        }
        if dgram.is_heartbeat() {
            match HeartbeatPose::from_payload(&dgram.payload) {
                Ok(pose) => self.store.upsert(dgram.sender_id, &pose),
                Err(e) => {
                    warn!(sender = %dgram.sender_id, error = %e, "bad heartbeat payload")
                }
            }
            return;
        }
        if let Some(target) = dgram.target_id {
            if target != self.self_id {
                // addressed elsewhere; the datagram still proves the sender
                // is alive, and may even carry a usable pose
                match HeartbeatPose::from_payload(&dgram.payload) {
                    Ok(pose) => self.store.upsert(dgram.sender_id, &pose),
                    Err(_) => self.store.touch(dgram.sender_id),
                }
                return;
            }
        }
        match Command::from_wire(dgram.command, &dgram.payload) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                warn!(sender = %dgram.sender_id, error = %e, "dropping unusable command")
            }
        }
    }

    async fn execute(&self, command: Command) {
        debug!(?command, "executing");
        let result = match command {
            Command::SetSpeed {
                vx,
                vy,
                vz,
                yaw_rate,
            } => self.vehicle.send_speed(vx, vy, vz, yaw_rate).await,
            Command::Goto { x, y, z, yaw } => self.vehicle.goto(x, y, z, yaw).await,
            Command::Takeoff => self.vehicle.takeoff().await,
            Command::Land => self.vehicle.land().await,
            Command::Arm => self.vehicle.arm().await,
            Command::Disarm => self.vehicle.disarm().await,
            Command::SmartGoto { x, y, z, yaw } => {
                // navigation outlives this tick; run it aside so the queue
                // keeps draining and the neighbor cache it reads stays fresh
                let navigator = self.navigator.clone();
                tokio::spawn(async move {
                    if let Err(e) = navigator.smart_goto(x, y, z, yaw, DEFAULT_ACCURACY).await {
                        warn!(error = %e, "smart goto failed");
                    }
                });
                Ok(())
            }
            Command::SetLed { led_id, r, g, b } => {
                self.vehicle.led_control(led_id, r, g, b).await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "vehicle rejected command");
        }
    }
}
