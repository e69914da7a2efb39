//! Ledger Nodes Service
//!
//! Continuously polls a set of ledger peers, determines which of them agree
//! on the furthest-advanced round ("tick"), and publishes a live snapshot
//! of the currently reliable peer set.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     LEDGER NODES                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Refresh Loop            ──→ probes all peers every 5s      │
//! │  Peer Manager            ──→ owns the peer address set      │
//! │  Peer Discovery          ──→ crawls advertised peer lists   │
//! │  Node Container          ──→ consensus max tick + snapshot  │
//! │  HTTP API (8080)         ──→ /status, /max-tick, ...        │
//! │  Metrics (2112)          ──→ Prometheus gauges              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod api;
mod config;
mod container;
mod discovery;
mod manager;
mod probe;
mod types;

use api::Metrics;
use config::NodesConfig;
use container::NodeContainer;
use discovery::{NoDiscovery, PeerDiscovery, PublicPeerDiscovery};
use manager::PeerManager;
use probe::{NodeProbe, TcpNodeProbe};

/// Ledger Nodes - peer reliability and discovery service
#[derive(Parser, Debug)]
#[command(name = "ledger-nodes")]
#[command(version = "0.1.0")]
#[command(about = "Peer reliability and discovery service for ledger networks", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ledger-nodes.toml")]
    config: PathBuf,

    /// Peer addresses to probe (overrides the config file)
    #[arg(long, value_delimiter = ';')]
    peers: Option<Vec<String>>,

    /// HTTP API port
    #[arg(long, default_value = "8080")]
    api_port: u16,

    /// Metrics endpoint port
    #[arg(long, default_value = "2112")]
    metrics_port: u16,

    /// Enable recursive public peer discovery
    #[arg(long)]
    public_discovery: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("Ledger Nodes Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        NodesConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        NodesConfig::default()
    };

    // Override config with CLI args; the flag only ever enables discovery
    let discovery_enabled = args.public_discovery || config.public_discovery;
    let config = config
        .with_peers(args.peers)
        .with_api_port(args.api_port)
        .with_metrics_port(args.metrics_port)
        .with_public_discovery(discovery_enabled);

    config.validate()?;

    info!("Configuration:");
    info!("   Configured peers: {}", config.peers.len());
    info!("   Peer port: {}", config.peer_port);
    info!("   Probe timeout: {}ms", config.probe_timeout_millis);
    info!("   Refresh interval: {}s", config.refresh_interval_secs);
    info!("   Tick error threshold: {}", config.tick_error_threshold);
    info!("   Reliable tick range: {}", config.reliable_tick_range);
    info!("   Public discovery: {}", config.public_discovery);

    let shared_config = Arc::new(config);

    // Wire probe, discovery, manager and container together
    let probe: Arc<dyn NodeProbe> = Arc::new(TcpNodeProbe::new(
        shared_config.peer_port,
        Duration::from_millis(shared_config.probe_timeout_millis),
    ));

    let discovery: Arc<dyn PeerDiscovery> = if shared_config.public_discovery {
        Arc::new(PublicPeerDiscovery::new(
            probe.clone(),
            shared_config.excluded_peers.clone(),
            Duration::from_secs(shared_config.clean_interval_secs),
            shared_config.max_discovered_per_pass,
        ))
    } else {
        Arc::new(NoDiscovery)
    };

    let manager = PeerManager::new(&shared_config.peers, probe, discovery);
    let container = Arc::new(NodeContainer::new(
        manager,
        shared_config.tick_error_threshold,
        shared_config.reliable_tick_range,
        shared_config.trim_tick_outliers,
    ));

    let metrics = Arc::new(Metrics::new(shared_config.metrics_instance_label.clone()));
    metrics.set_configured_node_count(container.configured_node_count() as u64);

    // Populate the snapshot once before serving requests
    container.update().await;

    // Start all services concurrently
    let refresh_handle = tokio::spawn(run_refresh_loop(
        shared_config.clone(),
        container.clone(),
        metrics.clone(),
    ));

    let api_handle = tokio::spawn(api::run_api_server(
        shared_config.clone(),
        container.clone(),
    ));

    let metrics_handle = tokio::spawn(api::run_metrics_server(
        shared_config.clone(),
        metrics.clone(),
    ));

    info!("All services started");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = refresh_handle => {
            error!("Refresh loop exited: {:?}", result);
        }
        result = api_handle => {
            error!("HTTP API exited: {:?}", result);
        }
        result = metrics_handle => {
            error!("Metrics server exited: {:?}", result);
        }
    }

    info!("Ledger Nodes shutting down");
    Ok(())
}

/// Drive the container refresh on a fixed interval.
///
/// Rounds run strictly sequentially: if one overruns the interval the next
/// tick is delayed, never run concurrently with the current one.
async fn run_refresh_loop(
    config: Arc<NodesConfig>,
    container: Arc<NodeContainer>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(config.refresh_interval_secs));
    // The first tick completes immediately; the startup refresh already ran
    interval.tick().await;

    loop {
        interval.tick().await;
        container.update().await;

        let response = container.get_response().await;
        metrics.set_reliable_node_count(response.reliable_nodes.len() as u64);
    }
}
