//! Service Configuration
//!
//! Configurable parameters for the peer reliability service.
//! Default values mirror a small public ledger deployment: fast refresh,
//! short probe timeouts, discovery disabled unless explicitly enabled.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the peer reliability service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesConfig {
    // === Peers ===

    /// Initial peer addresses, supplied by the operator.
    /// These are never removed by discovery.
    pub peers: Vec<String>,

    /// Transport port peers listen on
    pub peer_port: u16,

    // === Probing ===

    /// Per-probe connection timeout (milliseconds)
    pub probe_timeout_millis: u64,

    /// Interval between refresh rounds (seconds)
    pub refresh_interval_secs: u64,

    // === Consensus ===

    /// Gap between the two highest reported ticks above which the top
    /// value is treated as a single-node outlier
    pub tick_error_threshold: u32,

    /// How far below the consensus max tick a node may lag and still be
    /// considered reliable
    pub reliable_tick_range: u32,

    /// Whether to trim single-node outliers when computing the max tick.
    /// When disabled the plain maximum is used.
    pub trim_tick_outliers: bool,

    // === Discovery ===

    /// Enable recursive public peer discovery
    pub public_discovery: bool,

    /// Hosts that must never be added, regardless of what peers advertise
    pub excluded_peers: Vec<String>,

    /// Interval between cleanup passes that retire unresponsive
    /// discovered peers (seconds). Must be longer than the refresh
    /// interval so marginal peers are not bounced every round.
    pub clean_interval_secs: u64,

    /// Maximum candidates probed per discovery pass
    pub max_discovered_per_pass: usize,

    // === Network ===

    /// Port for the HTTP API
    pub api_port: u16,

    /// Port for the metrics endpoint
    pub metrics_port: u16,

    /// Optional constant `name` label attached to exported metrics
    pub metrics_instance_label: Option<String>,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            peers: vec![],
            peer_port: 21841,

            probe_timeout_millis: 2000,
            refresh_interval_secs: 5,

            tick_error_threshold: 50,
            reliable_tick_range: 30,
            trim_tick_outliers: true,

            public_discovery: false,
            excluded_peers: vec![],
            clean_interval_secs: 300,
            max_discovered_per_pass: 50,

            api_port: 8080,
            metrics_port: 2112,
            metrics_instance_label: None,
        }
    }
}

impl NodesConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Builder-style methods for CLI overrides

    pub fn with_peers(mut self, peers: Option<Vec<String>>) -> Self {
        if let Some(peers) = peers {
            self.peers = peers;
        }
        self
    }

    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = port;
        self
    }

    pub fn with_public_discovery(mut self, enabled: bool) -> Self {
        self.public_discovery = enabled;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.peers.is_empty() {
            anyhow::bail!("at least one peer address must be configured");
        }

        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be greater than zero");
        }

        if self.probe_timeout_millis == 0 {
            anyhow::bail!("probe_timeout_millis must be greater than zero");
        }

        if self.clean_interval_secs <= self.refresh_interval_secs {
            anyhow::bail!(
                "clean_interval_secs ({}) must be greater than refresh_interval_secs ({})",
                self.clean_interval_secs,
                self.refresh_interval_secs
            );
        }

        Ok(())
    }
}
