//! Peer Manager
//!
//! Owns the authoritative peer address list and drives one concurrent
//! probe fan-out per refresh round. Discovery verdicts (additions and
//! retirements) are applied asynchronously after a round's results have
//! been handed back, so they only affect the *next* round.
//!
//! The address list is split in two: `configured` addresses come from the
//! operator and are never removed, `current` is the set actually probed
//! (configured plus discovered, minus retired). The configured set is
//! always a subset of the current set.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::discovery::PeerDiscovery;
use crate::probe::NodeProbe;
use crate::types::NodeSnapshot;

/// Owns the peer address set and the per-round probe fan-out
pub struct PeerManager {
    configured_peers: Vec<String>,
    current_peers: RwLock<Vec<String>>,
    probe: Arc<dyn NodeProbe>,
    discovery: Arc<dyn PeerDiscovery>,
}

impl PeerManager {
    pub fn new(
        addresses: &[String],
        probe: Arc<dyn NodeProbe>,
        discovery: Arc<dyn PeerDiscovery>,
    ) -> Arc<Self> {
        let trimmed: Vec<String> = addresses.iter().map(|a| a.trim().to_string()).collect();
        Arc::new(Self {
            configured_peers: trimmed.clone(),
            current_peers: RwLock::new(trimmed),
            probe,
            discovery,
        })
    }

    /// Probe every current address concurrently and return this round's
    /// online nodes. Failed probes are absent from the result, never an
    /// error for the round.
    ///
    /// Discovery runs detached after the results are collected; the round
    /// being scored is never mutated by it.
    pub async fn probe_round(self: &Arc<Self>) -> Vec<NodeSnapshot> {
        let addresses = self.current_peers.read().await.clone();

        let mut probes: JoinSet<Option<NodeSnapshot>> = JoinSet::new();
        for address in addresses {
            let probe = self.probe.clone();
            probes.spawn(async move {
                match probe.probe(&address).await {
                    Ok(node) => Some(node),
                    Err(e) => {
                        debug!("Failed to probe node [{}]: {}", address, e);
                        None
                    }
                }
            });
        }

        let mut online_nodes = Vec::new();
        while let Some(result) = probes.join_next().await {
            if let Ok(Some(node)) = result {
                online_nodes.push(node);
            }
        }

        let manager = self.clone();
        let round_result = online_nodes.clone();
        tokio::spawn(async move {
            manager.update_peers(&round_result).await;
        });

        online_nodes
    }

    /// Apply discovery's verdict to the address set for the next round
    async fn update_peers(&self, nodes: &[NodeSnapshot]) {
        let current = self.current_peers.read().await.clone();

        let unhealthy = self.discovery.cleanup_peers(nodes, &current).await;
        let discovered = self.discovery.find_new_peers(nodes, &current).await;

        let mut current = self.current_peers.write().await;

        for host in unhealthy {
            // Configured addresses are immune to retirement
            if self.configured_peers.iter().any(|p| p == &host) {
                continue;
            }
            info!("Remove peer: [{}]", host);
            current.retain(|existing| existing.trim() != host);
        }

        for node in discovered {
            let host = node.address.trim().to_string();
            if !current.iter().any(|existing| existing == &host) {
                info!("Add peer: [{}]", host);
                current.push(host);
            }
        }
    }

    pub fn configured_node_count(&self) -> usize {
        self.configured_peers.len()
    }

    pub async fn known_node_count(&self) -> usize {
        self.current_peers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NoDiscovery;
    use crate::probe::ProbeError;
    use async_trait::async_trait;

    /// Probe that fails for listed hosts and answers with a fixed tick
    /// for everything else
    struct TestProbe {
        failing: Vec<String>,
    }

    impl TestProbe {
        fn new(failing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl NodeProbe for TestProbe {
        async fn probe(&self, address: &str) -> Result<NodeSnapshot, ProbeError> {
            if self.failing.iter().any(|h| h == address) {
                return Err(ProbeError::Protocol(format!(
                    "scripted failure for [{}]",
                    address
                )));
            }
            Ok(NodeSnapshot::new(address, 12345, vec![], 42))
        }
    }

    /// Discovery with a fixed verdict
    struct FixedVerdict {
        additions: Vec<NodeSnapshot>,
        retirements: Vec<String>,
    }

    #[async_trait]
    impl PeerDiscovery for FixedVerdict {
        async fn find_new_peers(&self, _: &[NodeSnapshot], _: &[String]) -> Vec<NodeSnapshot> {
            self.additions.clone()
        }

        async fn cleanup_peers(&self, _: &[NodeSnapshot], _: &[String]) -> Vec<String> {
            self.retirements.clone()
        }
    }

    fn addresses(hosts: &[&str]) -> Vec<String> {
        hosts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_probe_round_drops_failing_peers() {
        let manager = PeerManager::new(
            &addresses(&["1.2.3.4", "6.6.6.6", "2.3.4.5"]),
            TestProbe::new(&["6.6.6.6"]),
            Arc::new(NoDiscovery),
        );

        let nodes = manager.probe_round().await;

        assert_eq!(nodes.len(), 2);
        let hosts: Vec<_> = nodes.iter().map(|n| n.address.as_str()).collect();
        assert!(hosts.contains(&"1.2.3.4"));
        assert!(hosts.contains(&"2.3.4.5"));
    }

    #[tokio::test]
    async fn test_addresses_are_trimmed_on_construction() {
        let manager = PeerManager::new(
            &addresses(&[" 1.2.3.4", "2.3.4.5 "]),
            TestProbe::new(&[]),
            Arc::new(NoDiscovery),
        );

        assert_eq!(manager.configured_node_count(), 2);
        let current = manager.current_peers.read().await.clone();
        assert_eq!(current, addresses(&["1.2.3.4", "2.3.4.5"]));
    }

    #[tokio::test]
    async fn test_update_peers_applies_additions_and_retirements() {
        let discovery = FixedVerdict {
            additions: vec![
                NodeSnapshot::new("3.4.5.6", 12345, vec![], 42),
                // Already present, must not be duplicated
                NodeSnapshot::new("1.2.3.4", 12345, vec![], 42),
            ],
            retirements: addresses(&["2.3.4.5"]),
        };

        let manager = PeerManager::new(
            &addresses(&["1.2.3.4"]),
            TestProbe::new(&[]),
            Arc::new(discovery),
        );
        manager
            .current_peers
            .write()
            .await
            .push("2.3.4.5".to_string());

        manager.update_peers(&[]).await;

        let current = manager.current_peers.read().await.clone();
        assert_eq!(current, addresses(&["1.2.3.4", "3.4.5.6"]));
    }

    #[tokio::test]
    async fn test_configured_peers_are_never_retired() {
        let discovery = FixedVerdict {
            additions: vec![],
            retirements: addresses(&["1.2.3.4", "2.3.4.5"]),
        };

        let manager = PeerManager::new(
            &addresses(&["1.2.3.4"]),
            TestProbe::new(&[]),
            Arc::new(discovery),
        );
        manager
            .current_peers
            .write()
            .await
            .push("2.3.4.5".to_string());

        manager.update_peers(&[]).await;

        // Discovered peer retired, configured peer kept
        let current = manager.current_peers.read().await.clone();
        assert_eq!(current, addresses(&["1.2.3.4"]));
        assert_eq!(manager.known_node_count().await, 1);
    }
}
