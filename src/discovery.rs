//! Peer Discovery
//!
//! Strategies for growing and pruning the peer set from probe results.
//!
//! [`NoDiscovery`] keeps the operator-supplied list fixed.
//! [`PublicPeerDiscovery`] crawls advertised-peer edges recursively: every
//! candidate that answers a probe has its own advertised list fed back into
//! the same pass, so peers more than one hop away from the configured set
//! can be found in a single pass. Each pass is bounded by a candidate cap
//! and terminates at quiescence.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::probe::NodeProbe;
use crate::types::NodeSnapshot;

/// Strategy for proposing peer additions and retirements
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Propose new peer addresses based on this round's online nodes.
    /// Returned snapshots have been verified by a successful probe.
    async fn find_new_peers(
        &self,
        nodes: &[NodeSnapshot],
        current_addresses: &[String],
    ) -> Vec<NodeSnapshot>;

    /// Propose addresses to retire. Only fires once per clean interval;
    /// outside of that it returns nothing so marginal peers are not
    /// bounced every round.
    async fn cleanup_peers(
        &self,
        nodes: &[NodeSnapshot],
        current_addresses: &[String],
    ) -> Vec<String>;
}

/// Discovery disabled: the operator-supplied peer list is authoritative
pub struct NoDiscovery;

#[async_trait]
impl PeerDiscovery for NoDiscovery {
    async fn find_new_peers(&self, _: &[NodeSnapshot], _: &[String]) -> Vec<NodeSnapshot> {
        vec![]
    }

    async fn cleanup_peers(&self, _: &[NodeSnapshot], _: &[String]) -> Vec<String> {
        vec![]
    }
}

/// Working set for one discovery pass
///
/// Gates admission to the crawl queue: a host is probed at most once per
/// pass, and excluded hosts are never admitted. Admission goes through the
/// pass driver loop, which serializes access.
struct CrawlSet {
    known: HashSet<String>,
    excluded: HashSet<String>,
    new_hosts: Vec<String>,
}

impl CrawlSet {
    fn new(current_addresses: &[String], excluded: &[String]) -> Self {
        Self {
            known: current_addresses
                .iter()
                .map(|a| a.trim().to_string())
                .collect(),
            excluded: excluded.iter().map(|a| a.trim().to_string()).collect(),
            new_hosts: Vec::new(),
        }
    }

    fn contains(&self, host: &str) -> bool {
        self.known.contains(host) || self.new_hosts.iter().any(|h| h == host)
    }

    fn is_accepted(&self, host: &str) -> bool {
        !self.excluded.contains(host)
    }

    /// Admit `host` to the pass if it is acceptable and not yet seen
    fn add_if_new(&mut self, host: &str) -> bool {
        if self.is_accepted(host) && !self.contains(host) {
            self.new_hosts.push(host.to_string());
            true
        } else {
            false
        }
    }
}

/// Recursive crawl over publicly advertised peers
pub struct PublicPeerDiscovery {
    probe: Arc<dyn NodeProbe>,
    excluded_peers: Vec<String>,
    clean_interval: Duration,
    latest_cleanup: Mutex<Instant>,
    max_per_pass: usize,
}

impl PublicPeerDiscovery {
    pub fn new(
        probe: Arc<dyn NodeProbe>,
        excluded_peers: Vec<String>,
        clean_interval: Duration,
        max_per_pass: usize,
    ) -> Self {
        let trimmed = excluded_peers
            .iter()
            .map(|p| p.trim().to_string())
            .collect();
        Self {
            probe,
            excluded_peers: trimmed,
            clean_interval,
            latest_cleanup: Mutex::new(Instant::now()),
            max_per_pass,
        }
    }
}

#[async_trait]
impl PeerDiscovery for PublicPeerDiscovery {
    async fn find_new_peers(
        &self,
        nodes: &[NodeSnapshot],
        current_addresses: &[String],
    ) -> Vec<NodeSnapshot> {
        let mut seen = CrawlSet::new(current_addresses, &self.excluded_peers);

        // Seed the frontier with what this round's online nodes advertise
        let mut frontier: VecDeque<String> = nodes
            .iter()
            .flat_map(|node| node.peers.iter().cloned())
            .collect();

        let mut in_flight: JoinSet<Option<NodeSnapshot>> = JoinSet::new();
        let mut discovered = Vec::new();
        let mut admitted = 0usize;

        loop {
            // Fan out: admit frontier candidates up to the per-pass cap
            while admitted < self.max_per_pass {
                let Some(host) = frontier.pop_front() else {
                    break;
                };
                let host = host.trim().to_string();
                if host.is_empty() || !seen.add_if_new(&host) {
                    continue;
                }
                admitted += 1;

                let probe = self.probe.clone();
                in_flight.spawn(async move { probe.probe(&host).await.ok() });
            }

            // Drain: wait for the next candidate to resolve; the pass is
            // done once the frontier is empty and nothing is in flight
            match in_flight.join_next().await {
                None => break,
                Some(Ok(Some(node))) => {
                    debug!("Discovered peer: [{}]", node.address);
                    frontier.extend(node.peers.iter().cloned());
                    discovered.push(node);
                }
                // A candidate that fails to probe is dropped from the
                // pass, not retried
                Some(_) => {}
            }
        }

        if !discovered.is_empty() {
            info!("Discovery pass found {} new peers", discovered.len());
        }
        discovered
    }

    async fn cleanup_peers(
        &self,
        nodes: &[NodeSnapshot],
        current_addresses: &[String],
    ) -> Vec<String> {
        let mut latest_cleanup = self.latest_cleanup.lock().await;
        if latest_cleanup.elapsed() < self.clean_interval {
            return vec![];
        }
        *latest_cleanup = Instant::now();

        current_addresses
            .iter()
            .filter(|address| {
                let trimmed = address.trim();
                !nodes.iter().any(|node| node.address == trimmed)
            })
            .inspect(|address| debug!("Unhealthy peer: [{}]", address))
            .cloned()
            .collect()
    }
}
