//! Per-client dispatch: placement, dial, acknowledgement, and the
//! bidirectional byte pipe.
//!
//! Steps, per connection (§4.4):
//! 1. Capture the client key (peer IP, no port).
//! 2. Snapshot the pool; an empty pool ends the session immediately.
//! 3. Compute the FlipHash placement and pick a backend.
//! 4. Dial the backend; a dial failure reaps it and ends the session.
//! 5. Write `OK\n` to the client — only after the dial succeeds, so a
//!    dial failure never leaves a dangling acknowledgement.
//! 6. Pipe bytes bidirectionally with half-close semantics.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::DialError;
use crate::pool::{Backend, PoolManager};

const NO_BACKEND_MESSAGE: &[u8] = b"No backend server available\n";
const OK_MESSAGE: &[u8] = b"OK\n";

/// Handle one accepted client connection end-to-end.
pub async fn handle_client(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    pool: Arc<PoolManager>,
    dial_timeout: Duration,
    pipe_buffer: usize,
) -> io::Result<()> {
    let client_key = peer_addr.ip().to_string();

    let snapshot = pool.snapshot();
    if snapshot.is_empty() {
        client.write_all(NO_BACKEND_MESSAGE).await?;
        debug!(peer = %peer_addr, "no backend available");
        return Ok(());
    }

    let n = snapshot.len() as u64;
    let placed = fliphash::fliphash_general(&client_key, n) as usize % snapshot.len();
    let backend = snapshot[placed].clone();

    let mut backend_stream = match dial(&backend, dial_timeout).await {
        Ok(stream) => stream,
        Err(dial_err) => {
            warn!(
                peer = %peer_addr,
                error = %dial_err,
                "backend dial failed, reaping backend"
            );
            pool.remove(&backend).await;
            return Err(dial_err.into());
        }
    };

    client.write_all(OK_MESSAGE).await?;
    debug!(peer = %peer_addr, backend = %backend, "dispatched");

    let (to_backend, from_backend) =
        proxy_bidirectional(&mut client, &mut backend_stream, pipe_buffer).await;

    debug!(
        peer = %peer_addr,
        backend = %backend,
        bytes_to_backend = to_backend,
        bytes_from_backend = from_backend,
        "session closed"
    );

    Ok(())
}

async fn dial(backend: &Backend, dial_timeout: Duration) -> Result<TcpStream, DialError> {
    let result = match timeout(dial_timeout, TcpStream::connect((backend.host.as_str(), backend.port))).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "backend dial timeout")),
    };
    result.map_err(|source| DialError {
        backend: backend.to_string(),
        source,
    })
}

/// Pipe bytes bidirectionally until both directions observe EOF.
///
/// The up-pipe (client -> backend) half-closes the backend's write side
/// on client EOF, so the backend observes end-of-request while the
/// down-pipe keeps running until the backend decides to stop writing.
/// Any I/O error ends both halves; errors are not propagated to the
/// client, matching the "nothing is retried inside the load balancer"
/// policy.
async fn proxy_bidirectional(
    client: &mut TcpStream,
    backend: &mut TcpStream,
    pipe_buffer: usize,
) -> (u64, u64) {
    let (mut client_read, mut client_write) = client.split();
    let (mut backend_read, mut backend_write) = backend.split();

    let up = async {
        let mut buf = vec![0u8; pipe_buffer];
        let mut total = 0u64;
        loop {
            match client_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if backend_write.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                    total += n as u64;
                }
                Err(_) => break,
            }
        }
        let _ = backend_write.shutdown().await;
        total
    };

    let down = async {
        let mut buf = vec![0u8; pipe_buffer];
        let mut total = 0u64;
        loop {
            match backend_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if client_write.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                    total += n as u64;
                }
                Err(_) => break,
            }
        }
        let _ = client_write.shutdown().await;
        total
    };

    tokio::join!(up, down)
}
