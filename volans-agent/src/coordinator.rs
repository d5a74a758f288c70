//! Wires the transport, neighbor cache, dispatcher, and heartbeat publisher
//! into one start/stop unit.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use volans_core::identity::{AgentId, Identity};
use volans_core::neighbors::{EvictionPolicy, NeighborStore};
use volans_core::protocol::{Command, Datagram, HeartbeatPose};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::navigator::Navigator;
use crate::transport::{Broadcaster, Listener, TransportError};
use crate::vehicle::Vehicle;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordinator already running")]
    AlreadyRunning,
    #[error("coordinator not running")]
    NotRunning,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One agent's view of the swarm: publishes its own pose, tracks everyone
/// else's, and executes commands addressed to it.
pub struct SwarmCoordinator {
    config: Config,
    identity: Identity,
    vehicle: Arc<dyn Vehicle>,
    store: Arc<NeighborStore>,
    navigator: Arc<Navigator>,
    broadcaster: Option<Arc<Broadcaster>>,
    pending: Arc<AtomicUsize>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SwarmCoordinator {
    pub fn new(config: Config, identity: Identity, vehicle: Arc<dyn Vehicle>) -> Self {
        let store = Arc::new(NeighborStore::new());
        let navigator = Arc::new(Navigator::new(
            vehicle.clone(),
            store.clone(),
            config.safety_radius,
        ));
        SwarmCoordinator {
            config,
            identity,
            vehicle,
            store,
            navigator,
            broadcaster: None,
            pending: Arc::new(AtomicUsize::new(0)),
            shutdown: None,
            tasks: Vec::new(),
        }
    }

    /// Bind both sockets and spawn the listener, dispatcher, and publisher.
    /// Socket errors fail the whole start; nothing is left half-running.
    pub async fn start(&mut self) -> Result<(), CoordinatorError> {
        if self.shutdown.is_some() {
            return Err(CoordinatorError::AlreadyRunning);
        }
        let broadcaster = Arc::new(Broadcaster::bind(&self.config).await?);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let listener = Listener::bind(&self.config, queue_tx, self.pending.clone()).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.tasks.push(tokio::spawn(listener.run(shutdown_rx.clone())));

        let dispatcher = Dispatcher::new(
            self.identity.numeric(),
            self.store.clone(),
            self.vehicle.clone(),
            self.navigator.clone(),
            queue_rx,
            self.pending.clone(),
            self.config.dispatch_tick(),
        );
        self.tasks.push(tokio::spawn(dispatcher.run(shutdown_rx.clone())));

        self.tasks.push(tokio::spawn(publisher_loop(
            self.identity.numeric(),
            self.vehicle.clone(),
            broadcaster.clone(),
            self.store.clone(),
            self.config.heartbeat_interval(),
            self.config.eviction_policy(),
            shutdown_rx,
        )));

        self.broadcaster = Some(broadcaster);
        self.shutdown = Some(shutdown_tx);
        info!(identity = %self.identity, port = self.config.port, "swarm coordinator started");
        Ok(())
    }

    /// Signal every loop and wait for them to finish. Idempotent.
    pub async fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        let _ = shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "coordinator task panicked");
            }
        }
        self.broadcaster = None;
        info!("swarm coordinator stopped");
    }

    /// Broadcast a command, addressed to one agent or to the whole swarm.
    pub async fn send_command(
        &self,
        target: Option<AgentId>,
        command: &Command,
    ) -> Result<(), CoordinatorError> {
        let broadcaster = self
            .broadcaster
            .as_ref()
            .ok_or(CoordinatorError::NotRunning)?;
        let dgram = Datagram::command(self.identity.numeric(), target, command);
        broadcaster.send(&dgram).await?;
        Ok(())
    }

    /// Datagrams received but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<NeighborStore> {
        &self.store
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }
}

/// Announce the vehicle's pose every `interval` and prune stale neighbors on
/// the same cadence. Send failures are logged and the loop keeps going.
async fn publisher_loop(
    self_id: AgentId,
    vehicle: Arc<dyn Vehicle>,
    broadcaster: Arc<Broadcaster>,
    store: Arc<NeighborStore>,
    interval: Duration,
    eviction: EvictionPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let pose = HeartbeatPose {
            ip: vehicle.ip().parse().unwrap_or(Ipv4Addr::UNSPECIFIED),
            position: vehicle.position(),
            attitude: vehicle.attitude(),
        };
        let dgram = Datagram::heartbeat(self_id, &pose);
        if let Err(e) = broadcaster.send(&dgram).await {
            warn!(error = %e, "heartbeat send failed");
        }
        let removed = store.prune(eviction);
        if removed > 0 {
            debug!(removed, "evicted stale neighbors");
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }
}
