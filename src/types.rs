//! Core types shared across the service
//!
//! The central type is [`NodeSnapshot`]: one peer as observed by the most
//! recent successful probe. Snapshots are created fresh every round and
//! never mutated in place, so concurrent readers always see a consistent
//! observation.

use serde::{Deserialize, Serialize};

/// Round counter reported by ledger peers
pub type Tick = u32;

/// One peer as observed by a successful probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Peer host, immutable once created
    pub address: String,

    /// Transport port used for the probe
    pub port: u16,

    /// Addresses this peer claims to know about, as of the probe
    pub peers: Vec<String>,

    /// Round counter reported by the peer
    pub last_tick: Tick,

    /// UTC seconds the probe completed
    pub last_update: i64,

    /// Whether the most recent probe attempt succeeded
    pub last_update_success: bool,
}

impl NodeSnapshot {
    /// Build a snapshot for a peer that just answered a probe
    pub fn new(address: impl Into<String>, port: u16, peers: Vec<String>, last_tick: Tick) -> Self {
        Self {
            address: address.into(),
            port,
            peers,
            last_tick,
            last_update: current_timestamp(),
            last_update_success: true,
        }
    }
}

/// Get current Unix timestamp (UTC seconds)
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let node = NodeSnapshot::new("1.2.3.4", 21841, vec!["2.3.4.5".to_string()], 1000);

        assert_eq!(node.address, "1.2.3.4");
        assert_eq!(node.port, 21841);
        assert_eq!(node.last_tick, 1000);
        assert!(node.last_update_success);
        assert!(node.last_update > 1700000000); // After Nov 2023
    }
}
