//! Agent identity: display strings derived from ip + instance, numeric wire ids.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Numeric ids stay below 10^12 so they survive round-trips through f64
/// fields in downstream tooling.
const NUMERIC_ID_MODULUS: u64 = 1_000_000_000_000;

/// Wire-level agent id: stable hash of the display identity, modulo 10^12.
/// Distinct identities can collide; nothing detects or repairs that.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Wrap a raw wire value. Only decode paths should need this.
    pub fn from_u64(value: u64) -> Self {
        AgentId(value)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable numeric id for a display identity: first 8 bytes of the SHA-256
/// digest, little-endian, modulo 10^12.
pub fn numeric_id(unique: &str) -> AgentId {
    AgentId(hash_u64(unique) % NUMERIC_ID_MODULUS)
}

fn hash_u64(s: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Display identity of one agent process and its numeric wire id.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Identity {
    unique: String,
    numeric: AgentId,
}

impl Identity {
    /// Identity for an explicitly numbered instance on `ip`. Instance 1 keeps
    /// the bare octet so single-agent hosts get the short form.
    pub fn with_instance(ip: &str, instance: u32) -> Self {
        let octet = octet_or_hash(ip);
        let unique = if instance == 1 {
            octet
        } else {
            format!("{octet}-{instance}")
        };
        let numeric = numeric_id(&unique);
        Identity { unique, numeric }
    }

    pub fn unique(&self) -> &str {
        &self.unique
    }

    pub fn numeric(&self) -> AgentId {
        self.numeric
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique)
    }
}

/// Hands out instance-numbered identities, one counter per ip. Counters live
/// for the allocator's lifetime and never reset.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    counters: HashMap<String, u32>,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identity for `ip`: the first call yields the bare octet, later
    /// calls append `-2`, `-3`, ...
    pub fn allocate(&mut self, ip: &str) -> Identity {
        let counter = self.counters.entry(ip.to_string()).or_insert(0);
        *counter += 1;
        Identity::with_instance(ip, *counter)
    }
}

/// Last part of a dotted-quad ip, or a hash in 0..1000 for anything else.
fn octet_or_hash(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() == 4 {
        if let Ok(octet) = parts[3].parse::<u32>() {
            return octet.to_string();
        }
    }
    (hash_u64(ip) % 1000).to_string()
}
