//! Node Container
//!
//! Consumes one refresh round's probe results, derives the consensus max
//! tick and the reliable-peer band, and publishes the result as a single
//! immutable snapshot. Readers (HTTP handlers, metrics) always observe a
//! complete snapshot, never a torn mix of two rounds: the snapshot is
//! replaced wholesale behind a read-write lock.
//!
//! ## Consensus rule
//!
//! A lone peer far ahead of its cohort is more likely desynchronized than
//! authoritative. When outlier trimming is enabled and the gap between the
//! two highest reported ticks reaches the error threshold, the top value
//! is discarded and the second-highest becomes the consensus max tick.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::manager::PeerManager;
use crate::types::{current_timestamp, NodeSnapshot, Tick};

/// Published view of one refresh cycle
#[derive(Debug, Clone, Default)]
pub struct ReliabilitySnapshot {
    /// Consensus round number for this cycle
    pub max_tick: Tick,

    /// UTC seconds this cycle completed
    pub last_update: i64,

    /// Online nodes whose tick lies within the reliable band
    pub reliable_nodes: Vec<NodeSnapshot>,

    /// An online node at exactly `max_tick`, if any reached it
    pub most_reliable_node: Option<NodeSnapshot>,
}

/// Thread-safe container around the periodically refreshed snapshot
pub struct NodeContainer {
    manager: Arc<PeerManager>,
    tick_error_threshold: u32,
    reliable_tick_range: u32,
    trim_tick_outliers: bool,
    snapshot: RwLock<Arc<ReliabilitySnapshot>>,
}

impl NodeContainer {
    pub fn new(
        manager: Arc<PeerManager>,
        tick_error_threshold: u32,
        reliable_tick_range: u32,
        trim_tick_outliers: bool,
    ) -> Self {
        Self {
            manager,
            tick_error_threshold,
            reliable_tick_range,
            trim_tick_outliers,
            snapshot: RwLock::new(Arc::new(ReliabilitySnapshot::default())),
        }
    }

    /// Run one refresh round and publish the resulting snapshot.
    /// A round that probes zero peers still publishes a valid (empty)
    /// snapshot; this never fails.
    pub async fn update(&self) {
        info!("Refreshing nodes...");

        let mut online_nodes = self.manager.probe_round().await;

        let max_tick = calculate_max_tick(
            &mut online_nodes,
            self.tick_error_threshold,
            self.trim_tick_outliers,
        );
        let min_tick = max_tick.saturating_sub(self.reliable_tick_range);
        let (reliable_nodes, most_reliable_node) =
            reliable_nodes(&online_nodes, max_tick, min_tick);

        info!("Node count: {}", self.manager.known_node_count().await);
        info!("Max tick: {}", max_tick);
        info!(
            "Reliable nodes: {} / {} online",
            reliable_nodes.len(),
            online_nodes.len()
        );
        if let Some(node) = &most_reliable_node {
            info!("Most reliable node: {}", node.address);
        }

        let snapshot = Arc::new(ReliabilitySnapshot {
            max_tick,
            last_update: current_timestamp(),
            reliable_nodes,
            most_reliable_node,
        });

        *self.snapshot.write().await = snapshot;
    }

    /// Get the currently published snapshot
    pub async fn get_response(&self) -> Arc<ReliabilitySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Filter the current reliable set to nodes at or above `tick`.
    /// Returns an empty list when none qualify.
    pub async fn reliable_nodes_with_minimum_tick(&self, tick: Tick) -> Vec<NodeSnapshot> {
        let snapshot = self.snapshot.read().await.clone();
        snapshot
            .reliable_nodes
            .iter()
            .filter(|node| node.last_tick >= tick)
            .cloned()
            .collect()
    }

    pub fn configured_node_count(&self) -> usize {
        self.manager.configured_node_count()
    }

    pub async fn known_node_count(&self) -> usize {
        self.manager.known_node_count().await
    }
}

/// Derive the consensus max tick from this round's online nodes.
///
/// Sorts `nodes` ascending by tick. With trimming enabled, a top value
/// that sits `threshold` or more ticks above its nearest (nonzero)
/// corroborator is rejected as a single-node outlier and the
/// second-highest tick wins.
fn calculate_max_tick(nodes: &mut [NodeSnapshot], threshold: u32, trim: bool) -> Tick {
    nodes.sort_by_key(|node| node.last_tick);

    let Some(top) = nodes.last().map(|node| node.last_tick) else {
        return 0;
    };

    if trim && nodes.len() >= 2 {
        let second = nodes[nodes.len() - 2].last_tick;
        if second != 0 && top - second >= threshold {
            return second;
        }
    }

    top
}

/// Collect the nodes whose tick lies in `[minimum, maximum]`, plus one
/// node at exactly `maximum` if any reached it
fn reliable_nodes(
    online_nodes: &[NodeSnapshot],
    maximum: Tick,
    minimum: Tick,
) -> (Vec<NodeSnapshot>, Option<NodeSnapshot>) {
    let mut reliable = Vec::with_capacity(online_nodes.len());
    let mut most_reliable = None;

    for node in online_nodes {
        if node.last_tick >= minimum && node.last_tick <= maximum {
            if node.last_tick == maximum && most_reliable.is_none() {
                most_reliable = Some(node.clone());
            }
            reliable.push(node.clone());
        }
    }

    (reliable, most_reliable)
}
