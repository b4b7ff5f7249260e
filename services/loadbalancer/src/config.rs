//! Load balancer configuration.
//!
//! Ports and timeouts are compile-time constants per the external
//! contract, with environment-variable override points so the same
//! binary can be run in different environments without a rebuild.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;

use crate::error::ConfigError;

/// Default client listener bind address.
pub const DEFAULT_CLIENT_ADDR: &str = "0.0.0.0:5000";
/// Default backend registration listener bind address.
pub const DEFAULT_REGISTRATION_ADDR: &str = "0.0.0.0:6001";
/// Default backend metrics listener bind address.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:6003";
/// Default proxy copy buffer size in bytes.
pub const DEFAULT_PIPE_BUFFER: usize = 4096;
/// Default period of the health checker's liveness sweep.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(3);
/// Default per-probe connect deadline.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(1);
/// Default dispatcher backend dial deadline.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Load balancer configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Client listener bind address.
    pub client_addr: SocketAddr,
    /// Backend registration listener bind address.
    pub registration_addr: SocketAddr,
    /// Backend metrics listener bind address.
    pub metrics_addr: SocketAddr,
    /// Proxy copy buffer size in bytes.
    pub pipe_buffer: usize,
    /// Period of the health checker's liveness sweep.
    pub health_interval: Duration,
    /// Per-probe connect deadline.
    pub health_timeout: Duration,
    /// Dispatcher backend dial deadline.
    pub dial_timeout: Duration,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let client_addr = parse_addr_env("FLIPHASH_CLIENT_ADDR", DEFAULT_CLIENT_ADDR)?;
        let registration_addr =
            parse_addr_env("FLIPHASH_REGISTRATION_ADDR", DEFAULT_REGISTRATION_ADDR)?;
        let metrics_addr = parse_addr_env("FLIPHASH_METRICS_ADDR", DEFAULT_METRICS_ADDR)?;

        let pipe_buffer = parse_int_env("FLIPHASH_PIPE_BUFFER", DEFAULT_PIPE_BUFFER)?;

        let health_interval =
            parse_duration_ms_env("FLIPHASH_HEALTH_INTERVAL_MS", DEFAULT_HEALTH_INTERVAL)?;
        let health_timeout =
            parse_duration_ms_env("FLIPHASH_HEALTH_TIMEOUT_MS", DEFAULT_HEALTH_TIMEOUT)?;
        let dial_timeout =
            parse_duration_ms_env("FLIPHASH_DIAL_TIMEOUT_MS", DEFAULT_DIAL_TIMEOUT)?;

        let log_level = std::env::var("FLIPHASH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            client_addr,
            registration_addr,
            metrics_addr,
            pipe_buffer,
            health_interval,
            health_timeout,
            dial_timeout,
            log_level,
        })
    }
}

fn parse_addr_env(var: &'static str, default: &str) -> Result<SocketAddr> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    let addr = raw.parse().map_err(|source| ConfigError::InvalidAddr {
        var,
        value: raw.clone(),
        source,
    })?;
    Ok(addr)
}

fn parse_duration_ms_env(var: &'static str, default: Duration) -> Result<Duration> {
    match std::env::var(var).ok() {
        None => Ok(default),
        Some(raw) => {
            let ms: u64 = raw
                .parse()
                .map_err(|source| ConfigError::InvalidInt { var, source })?;
            Ok(Duration::from_millis(ms))
        }
    }
}

fn parse_int_env(var: &'static str, default: usize) -> Result<usize> {
    match std::env::var(var).ok() {
        None => Ok(default),
        Some(raw) => Ok(raw
            .parse()
            .map_err(|source| ConfigError::InvalidInt { var, source })?),
    }
}
