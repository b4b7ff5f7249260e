//! Backend metrics listener: accept, read newline-delimited JSON until
//! EOF. Each line is expected to carry at least a `"backendId"` field;
//! other fields are opaque and simply retained in the metrics map.
//! Lines without a parseable `backendId` are discarded.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::BindError;
use crate::pool::PoolManager;

#[derive(Debug, Deserialize)]
struct MetricsEnvelope {
    #[serde(rename = "backendId")]
    backend_id: Option<String>,
}

pub async fn run_metrics_listener(
    bind_addr: SocketAddr,
    pool: Arc<PoolManager>,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| BindError::new("metrics", bind_addr, source))?;
    info!(bind_addr = %bind_addr, "metrics listener bound");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let pool = Arc::clone(&pool);
                        tokio::spawn(async move {
                            handle_metrics_connection(stream, peer_addr, pool).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "metrics accept error");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("metrics listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_metrics_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    pool: Arc<PoolManager>,
) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => apply_metrics_line(&pool, peer_addr, line.trim()).await,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "metrics read error");
                break;
            }
        }
    }
}

async fn apply_metrics_line(pool: &PoolManager, peer_addr: SocketAddr, line: &str) {
    if line.is_empty() {
        return;
    }

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "malformed metrics line, discarding");
            return;
        }
    };

    let envelope: MetricsEnvelope = match serde_json::from_value(value.clone()) {
        Ok(e) => e,
        Err(_) => {
            warn!(peer = %peer_addr, "metrics line missing backendId, discarding");
            return;
        }
    };

    match envelope.backend_id {
        Some(backend_id) if !backend_id.is_empty() => {
            debug!(peer = %peer_addr, backend_id = %backend_id, "metrics applied");
            pool.set_metrics(&backend_id, value).await;
        }
        _ => {
            warn!(peer = %peer_addr, "metrics line missing backendId, discarding");
        }
    }
}
