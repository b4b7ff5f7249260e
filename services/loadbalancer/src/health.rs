//! Health checker: a periodic task that probes every registered backend
//! and reaps any that fail to connect.
//!
//! Probes run sequentially per tick — acceptable at the pool sizes this
//! system targets (§4.5 notes ~100 backends). A probe that connects but
//! fails mid-write still counts as alive, since the connect already
//! established reachability.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::frame::encode_utf_string;
use crate::pool::PoolManager;

const PROBE_FRAME: &str = "health check";

/// Run the health checker's sweep loop until `shutdown` resolves.
pub async fn run_health_checker(
    pool: Arc<PoolManager>,
    interval: Duration,
    probe_timeout: Duration,
    shutdown: impl std::future::Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep(&pool, probe_timeout).await;
            }
            _ = &mut shutdown => {
                info!("health checker shutting down");
                return;
            }
        }
    }
}

async fn sweep(pool: &PoolManager, probe_timeout: Duration) {
    let snapshot = pool.snapshot();
    debug!(backend_count = snapshot.len(), "health sweep starting");

    for backend in snapshot.iter() {
        if probe(backend, probe_timeout).await {
            continue;
        }

        warn!(backend = %backend, "health probe failed, reaping backend");
        pool.remove(backend).await;
    }
}

/// Probe a single backend: connect within `probe_timeout`, optionally
/// write the length-prefixed `"health check"` frame. Connect success is
/// sufficient for liveness; a write failure after a successful connect
/// does not count against the backend.
async fn probe(backend: &crate::pool::Backend, probe_timeout: Duration) -> bool {
    let connect = timeout(
        probe_timeout,
        TcpStream::connect((backend.host.as_str(), backend.port)),
    )
    .await;

    let mut stream = match connect {
        Ok(Ok(stream)) => stream,
        _ => return false,
    };

    if let Ok(frame) = encode_utf_string(PROBE_FRAME) {
        use tokio::io::AsyncWriteExt;
        let _ = stream.write_all(&frame).await;
    }

    true
}
