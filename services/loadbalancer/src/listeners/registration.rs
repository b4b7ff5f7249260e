//! Backend registration listener: accept, read one `HOST:PORT` line,
//! close. Malformed lines are discarded silently; the connection still
//! closes normally.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::BindError;
use crate::pool::{Backend, PoolManager};

pub async fn run_registration_listener(
    bind_addr: SocketAddr,
    pool: Arc<PoolManager>,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| BindError::new("registration", bind_addr, source))?;
    info!(bind_addr = %bind_addr, "registration listener bound");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let pool = Arc::clone(&pool);
                        tokio::spawn(async move {
                            handle_registration(stream, peer_addr, pool).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "registration accept error");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("registration listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_registration(stream: tokio::net::TcpStream, peer_addr: SocketAddr, pool: Arc<PoolManager>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    match reader.read_line(&mut line).await {
        Ok(0) => debug!(peer = %peer_addr, "registration connection closed with no data"),
        Ok(_) => {
            let trimmed = line.trim();
            match Backend::parse_id(trimmed) {
                Some(backend) => {
                    let newly_added = pool.add(backend.clone());
                    info!(peer = %peer_addr, backend = %backend, newly_added, "backend registered");
                }
                None => {
                    warn!(peer = %peer_addr, line = %trimmed, "malformed registration line, discarding");
                }
            }
        }
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "registration read error");
        }
    }
}
