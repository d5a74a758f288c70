//! Load agent config from file and environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use volans_core::neighbors::EvictionPolicy;

/// Agent configuration. File: ~/.config/volans/config.toml or
/// /etc/volans/config.toml. Env overrides: VOLANS_PORT,
/// VOLANS_BROADCAST_ADDR, VOLANS_BROADCAST_PORT, VOLANS_IP, VOLANS_INSTANCE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// UDP port to listen on (default 37020).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address the receive socket binds (default 0.0.0.0).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Destination address for outgoing datagrams (default 255.255.255.255).
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,
    /// Destination port for outgoing datagrams; `port` when unset.
    #[serde(default)]
    pub broadcast_port: Option<u16>,
    /// Own IPv4 address, used for identity and the heartbeat pose.
    #[serde(default = "default_ip")]
    pub ip: String,
    /// Explicit instance number on this host; allocated when unset.
    #[serde(default)]
    pub instance: Option<u32>,
    /// Heartbeat cadence in milliseconds (default 50).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Receive-queue poll cadence in milliseconds (default 50).
    #[serde(default = "default_dispatch_tick_ms")]
    pub dispatch_tick_ms: u64,
    /// Separation the avoidance law defends, meters (default 1.0).
    #[serde(default = "default_safety_radius")]
    pub safety_radius: f64,
    /// Vehicle speed ceiling, m/s (default 1.0).
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    /// Evict neighbors not heard from for this many milliseconds; unset
    /// keeps every entry forever.
    #[serde(default)]
    pub stale_after_ms: Option<u64>,
}

fn default_port() -> u16 {
    volans_core::protocol::DEFAULT_PORT
}
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_broadcast_addr() -> String {
    "255.255.255.255".to_string()
}
fn default_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_heartbeat_interval_ms() -> u64 {
    50
}
fn default_dispatch_tick_ms() -> u64 {
    50
}
fn default_safety_radius() -> f64 {
    1.0
}
fn default_max_speed() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            broadcast_addr: default_broadcast_addr(),
            broadcast_port: None,
            ip: default_ip(),
            instance: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            dispatch_tick_ms: default_dispatch_tick_ms(),
            safety_radius: default_safety_radius(),
            max_speed: default_max_speed(),
            stale_after_ms: None,
        }
    }
}

impl Config {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn dispatch_tick(&self) -> Duration {
        Duration::from_millis(self.dispatch_tick_ms)
    }

    /// Port outgoing datagrams are addressed to.
    pub fn broadcast_port(&self) -> u16 {
        self.broadcast_port.unwrap_or(self.port)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        match self.stale_after_ms {
            Some(ms) => EvictionPolicy::StaleAfter(Duration::from_millis(ms)),
            None => EvictionPolicy::Never,
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("VOLANS_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Ok(s) = std::env::var("VOLANS_BROADCAST_ADDR") {
        c.broadcast_addr = s;
    }
    if let Ok(s) = std::env::var("VOLANS_BROADCAST_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.broadcast_port = Some(p);
        }
    }
    if let Ok(s) = std::env::var("VOLANS_IP") {
        c.ip = s;
    }
    if let Ok(s) = std::env::var("VOLANS_INSTANCE") {
        if let Ok(n) = s.parse::<u32>() {
            c.instance = Some(n);
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/volans/config.toml"));
    }
    out.push(PathBuf::from("/etc/volans/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}
