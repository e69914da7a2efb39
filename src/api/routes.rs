//! API Routes
//!
//! Read-only HTTP endpoints over the published reliability snapshot.
//! `/status` answers 503 while no reliable nodes are known so load
//! balancers can take the instance out of rotation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::NodesConfig;
use crate::container::NodeContainer;
use crate::types::{NodeSnapshot, Tick};

/// Shared API state
pub struct ApiState {
    pub container: Arc<NodeContainer>,
}

/// Node fields exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub address: String,
    pub port: u16,
    pub peers: Vec<String>,
    pub last_tick: Tick,
    pub last_update: i64,
}

impl From<&NodeSnapshot> for NodeView {
    fn from(node: &NodeSnapshot) -> Self {
        Self {
            address: node.address.clone(),
            port: node.port,
            peers: node.peers.clone(),
            last_tick: node.last_tick,
            last_update: node.last_update,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    max_tick: Tick,
    last_update: i64,
    number_of_configured_nodes: usize,
    reliable_nodes: Vec<NodeView>,
    most_reliable_node: Option<NodeView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MaxTickResponse {
    max_tick: Tick,
}

#[derive(Debug, Serialize, Deserialize)]
struct MinimumTickRequest {
    minimum_tick: Tick,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReliableNodesResponse {
    requested_minimum_tick: Tick,
    reliable_nodes: Vec<NodeView>,
}

/// Run the HTTP API server
pub async fn run_api_server(
    config: Arc<NodesConfig>,
    container: Arc<NodeContainer>,
) -> anyhow::Result<()> {
    let state = Arc::new(ApiState { container });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/max-tick", get(get_max_tick))
        .route("/reliable-nodes", post(get_reliable_nodes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("HTTP API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Published snapshot of the reliable peer set
async fn get_status(State(state): State<Arc<ApiState>>) -> Response {
    let response = state.container.get_response().await;

    if response.reliable_nodes.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "No online or reliable nodes found.",
        )
            .into_response();
    }

    let status = StatusResponse {
        max_tick: response.max_tick,
        last_update: response.last_update,
        number_of_configured_nodes: state.container.configured_node_count(),
        reliable_nodes: response.reliable_nodes.iter().map(NodeView::from).collect(),
        most_reliable_node: response.most_reliable_node.as_ref().map(NodeView::from),
    };

    Json(status).into_response()
}

/// GET /max-tick - Consensus max tick only
async fn get_max_tick(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let response = state.container.get_response().await;

    Json(MaxTickResponse {
        max_tick: response.max_tick,
    })
}

/// POST /reliable-nodes - Reliable nodes at or above a requested tick
async fn get_reliable_nodes(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<MinimumTickRequest>,
) -> impl IntoResponse {
    let reliable_nodes = state
        .container
        .reliable_nodes_with_minimum_tick(request.minimum_tick)
        .await;

    Json(ReliableNodesResponse {
        requested_minimum_tick: request.minimum_tick,
        reliable_nodes: reliable_nodes.iter().map(NodeView::from).collect(),
    })
}
