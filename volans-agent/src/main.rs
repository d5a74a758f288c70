// Volans agent daemon: heartbeat publisher, command dispatch, swarm navigation.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use volans_agent::config;
use volans_agent::coordinator::SwarmCoordinator;
use volans_agent::sim::SimVehicle;
use volans_core::identity::{Identity, IdentityAllocator};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("volans-agent {}", VERSION);
            return Ok(());
        }
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("building log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = config::load();
    let identity = match cfg.instance {
        Some(instance) => Identity::with_instance(&cfg.ip, instance),
        None => IdentityAllocator::new().allocate(&cfg.ip),
    };
    info!(%identity, numeric = %identity.numeric(), ip = %cfg.ip, "agent identity");

    let vehicle =
        Arc::new(SimVehicle::new(identity.unique(), &cfg.ip).with_max_speed(cfg.max_speed));
    let mut coordinator = SwarmCoordinator::new(cfg, identity, vehicle);

    let rt = tokio::runtime::Runtime::new().context("building runtime")?;
    rt.block_on(async {
        coordinator.start().await.context("starting coordinator")?;
        shutdown_signal().await?;
        info!("shutting down");
        coordinator.stop().await;
        Ok::<(), anyhow::Error>(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix). On shutdown the coordinator stops its
/// loops; systemd may restart the unit if configured.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
