//! FlipHash load balancer.
//!
//! This service:
//! - Accepts client sessions and routes each to a backend via FlipHash
//! - Accepts backend self-registration and metrics pushes
//! - Periodically reaps unresponsive backends
//! - Proxies bytes bidirectionally between client and backend

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod dispatcher;
mod error;
mod frame;
mod health;
mod listeners;
mod pool;

use pool::PoolManager;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        client_addr = %config.client_addr,
        registration_addr = %config.registration_addr,
        metrics_addr = %config.metrics_addr,
        pipe_buffer = config.pipe_buffer,
        health_interval_ms = config.health_interval.as_millis() as u64,
        health_timeout_ms = config.health_timeout.as_millis() as u64,
        dial_timeout_ms = config.dial_timeout.as_millis() as u64,
        "starting fliphash load balancer"
    );

    let pool = Arc::new(PoolManager::new());
    let shutdown = Arc::new(Notify::new());

    let client_handle = tokio::spawn(listeners::run_client_listener(
        config.client_addr,
        Arc::clone(&pool),
        config.dial_timeout,
        config.pipe_buffer,
        notified(Arc::clone(&shutdown)),
    ));

    let registration_handle = tokio::spawn(listeners::run_registration_listener(
        config.registration_addr,
        Arc::clone(&pool),
        notified(Arc::clone(&shutdown)),
    ));

    let metrics_handle = tokio::spawn(listeners::run_metrics_listener(
        config.metrics_addr,
        Arc::clone(&pool),
        notified(Arc::clone(&shutdown)),
    ));

    let health_handle = tokio::spawn(health::run_health_checker(
        Arc::clone(&pool),
        config.health_interval,
        config.health_timeout,
        notified(Arc::clone(&shutdown)),
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.notify_waiters();

    // Listeners abandon in-flight sessions on shutdown rather than
    // waiting for every spawned session task to finish.
    client_handle.await??;
    registration_handle.await??;
    metrics_handle.await??;
    health_handle.await?;

    info!("shutdown complete");
    Ok(())
}

fn notified(notify: Arc<Notify>) -> impl std::future::Future<Output = ()> {
    async move { notify.notified().await }
}
