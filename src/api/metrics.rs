//! Metrics Collection
//!
//! Gauges for monitoring the service, exported in Prometheus text format
//! on a listener separate from the main API.

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::NodesConfig;

/// Metrics collector
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Instant,

    /// Optional constant `name` label for all exported metrics
    instance_label: Option<String>,

    /// Number of operator-configured peer addresses
    pub configured_node_count: AtomicU64,

    /// Number of currently reliable nodes
    pub reliable_node_count: AtomicU64,
}

impl Metrics {
    pub fn new(instance_label: Option<String>) -> Self {
        Self {
            start_time: Instant::now(),
            instance_label,
            configured_node_count: AtomicU64::new(0),
            reliable_node_count: AtomicU64::new(0),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Update configured node count
    pub fn set_configured_node_count(&self, count: u64) {
        self.configured_node_count.store(count, Ordering::Relaxed);
    }

    /// Update reliable node count
    pub fn set_reliable_node_count(&self, count: u64) {
        self.reliable_node_count.store(count, Ordering::Relaxed);
    }

    /// Render the constant label set, e.g. `{name="instance-a"}`
    fn labels(&self) -> String {
        match &self.instance_label {
            Some(label) => format!("{{name=\"{}\"}}", label),
            None => String::new(),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let labels = self.labels();
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP ledger_nodes_uptime_seconds Service uptime in seconds\n\
             # TYPE ledger_nodes_uptime_seconds gauge\n\
             ledger_nodes_uptime_seconds{} {}\n\n",
            labels,
            self.uptime_secs()
        ));

        output.push_str(&format!(
            "# HELP ledger_nodes_configured_node_count The number of total configured nodes\n\
             # TYPE ledger_nodes_configured_node_count gauge\n\
             ledger_nodes_configured_node_count{} {}\n\n",
            labels,
            self.configured_node_count.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP ledger_nodes_reliable_node_count The number of current reliable nodes\n\
             # TYPE ledger_nodes_reliable_node_count gauge\n\
             ledger_nodes_reliable_node_count{} {}\n\n",
            labels,
            self.reliable_node_count.load(Ordering::Relaxed)
        ));

        output
    }
}

/// Run the metrics listener
pub async fn run_metrics_server(
    config: Arc<NodesConfig>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    info!("Metrics server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metrics.to_prometheus(),
    )
}
