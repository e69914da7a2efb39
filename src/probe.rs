//! Node Probe Adapter
//!
//! Boundary to the peer wire protocol. A probe opens a connection, fetches
//! the peer's current tick and advertised peer list, and closes the
//! connection, all within a hard timeout. The rest of the service treats
//! this as an opaque capability: a probe either yields a [`NodeSnapshot`]
//! or fails, and all failure causes are treated the same way when deciding
//! reliability.
//!
//! ## Wire format
//!
//! 1. Connect to `host:port` (TCP)
//! 2. Send `TickRequest` (bincode, 4-byte big-endian length prefix)
//! 3. Read `TickResponse` (same framing)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::types::{NodeSnapshot, Tick};

/// Maximum response size (1MB)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Probe protocol version
const PROTOCOL_VERSION: u32 = 1;

/// Why a probe yielded no snapshot
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connecting to node: {0}")]
    Connect(#[from] std::io::Error),

    #[error("node did not respond within {0:?}")]
    Timeout(Duration),

    #[error("invalid response from node: {0}")]
    Protocol(String),
}

/// Capability to observe one peer
#[async_trait]
pub trait NodeProbe: Send + Sync {
    /// Fetch the current tick and peer list from `address`
    async fn probe(&self, address: &str) -> Result<NodeSnapshot, ProbeError>;
}

/// Request sent to a peer
#[derive(Debug, Serialize, Deserialize)]
struct TickRequest {
    version: u32,
}

/// Response expected from a peer
#[derive(Debug, Serialize, Deserialize)]
struct TickResponse {
    tick: Tick,
    peers: Vec<String>,
}

/// Probe implementation over the TCP tick-exchange protocol
pub struct TcpNodeProbe {
    port: u16,
    timeout: Duration,
}

impl TcpNodeProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    async fn exchange(&self, address: &str) -> Result<TickResponse, ProbeError> {
        let mut stream = TcpStream::connect((address, self.port)).await?;

        // Request
        let request = bincode::serialize(&TickRequest {
            version: PROTOCOL_VERSION,
        })
        .map_err(|e| ProbeError::Protocol(e.to_string()))?;
        stream.write_all(&(request.len() as u32).to_be_bytes()).await?;
        stream.write_all(&request).await?;
        stream.flush().await?;

        // Response length (4 bytes, big-endian)
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let msg_len = u32::from_be_bytes(len_buf) as usize;

        if msg_len > MAX_MESSAGE_SIZE {
            return Err(ProbeError::Protocol(format!(
                "response too large: {} bytes",
                msg_len
            )));
        }

        // Response body
        let mut msg_buf = vec![0u8; msg_len];
        stream.read_exact(&mut msg_buf).await?;

        bincode::deserialize(&msg_buf).map_err(|e| ProbeError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl NodeProbe for TcpNodeProbe {
    async fn probe(&self, address: &str) -> Result<NodeSnapshot, ProbeError> {
        let response = tokio::time::timeout(self.timeout, self.exchange(address))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        debug!("Found online node: {} - {}", address, response.tick);

        Ok(NodeSnapshot::new(
            address,
            self.port,
            response.peers,
            response.tick,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_answers_within_timeout() {
        // Minimal in-process peer speaking the tick-exchange protocol
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await.unwrap();
            let mut buf = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut buf).await.unwrap();
            let request: TickRequest = bincode::deserialize(&buf).unwrap();
            assert_eq!(request.version, PROTOCOL_VERSION);

            let response = bincode::serialize(&TickResponse {
                tick: 1234,
                peers: vec!["2.3.4.5".to_string()],
            })
            .unwrap();
            stream
                .write_all(&(response.len() as u32).to_be_bytes())
                .await
                .unwrap();
            stream.write_all(&response).await.unwrap();
        });

        let probe = TcpNodeProbe::new(port, Duration::from_secs(2));
        let node = probe.probe("127.0.0.1").await.unwrap();

        assert_eq!(node.last_tick, 1234);
        assert_eq!(node.peers, vec!["2.3.4.5".to_string()]);
        assert!(node.last_update_success);
    }

    #[tokio::test]
    async fn test_probe_times_out_on_silent_peer() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let probe = TcpNodeProbe::new(port, Duration::from_millis(50));
        let result = probe.probe("127.0.0.1").await;

        assert!(matches!(result, Err(ProbeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_probe_fails_on_refused_connection() {
        // Grab a port and close the listener so the connect is refused
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpNodeProbe::new(port, Duration::from_secs(1));
        let result = probe.probe("127.0.0.1").await;

        assert!(result.is_err());
    }
}
