//! HTTP Surface
//!
//! Read-only endpoints over the published reliability snapshot, plus a
//! dedicated metrics listener.

mod metrics;
mod routes;

pub use metrics::{run_metrics_server, Metrics};
pub use routes::run_api_server;
