//! Client listener: accepts sessions and hands each to the dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn, Instrument};

use crate::dispatcher::handle_client;
use crate::error::BindError;
use crate::pool::PoolManager;

/// Bind the client listener and run its accept loop until `shutdown`
/// resolves. A bind failure is returned to the caller; accept errors are
/// logged and the loop continues.
pub async fn run_client_listener(
    bind_addr: SocketAddr,
    pool: Arc<PoolManager>,
    dial_timeout: Duration,
    pipe_buffer: usize,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = bind_client_listener(bind_addr).await?;
    serve_client_listener(listener, pool, dial_timeout, pipe_buffer, shutdown).await
}

/// Bind the client listener without starting its accept loop. Split out
/// so callers (tests, mainly) can learn the bound address before serving,
/// which matters when `bind_addr` asks for an ephemeral port.
pub async fn bind_client_listener(bind_addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| BindError::new("client", bind_addr, source))?;
    info!(bind_addr = %listener.local_addr()?, "client listener bound");
    Ok(listener)
}

/// Run the accept loop on an already-bound listener until `shutdown`
/// resolves. Accept errors are logged and the loop continues.
pub async fn serve_client_listener(
    listener: TcpListener,
    pool: Arc<PoolManager>,
    dial_timeout: Duration,
    pipe_buffer: usize,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let pool = Arc::clone(&pool);
                        tokio::spawn(
                            async move {
                                if let Err(e) =
                                    handle_client(stream, peer_addr, pool, dial_timeout, pipe_buffer).await
                                {
                                    debug!(peer = %peer_addr, error = %e, "session ended with error");
                                }
                            }
                            .instrument(tracing::info_span!("client_session", peer = %peer_addr)),
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "client accept error");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("client listener shutting down");
                return Ok(());
            }
        }
    }
}
