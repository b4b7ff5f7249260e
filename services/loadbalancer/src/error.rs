//! Typed error boundaries for the fallible operations that cross module
//! boundaries: listener binds, backend dials, and configuration parsing.
//! Each type carries enough context to log meaningfully; callers convert
//! to `anyhow::Result` once the error reaches the `main` boundary.

use std::net::SocketAddr;

use thiserror::Error;

/// A listener failed to bind its port. Fatal to that listener only (§7).
#[derive(Debug, Error)]
#[error("failed to bind {kind} listener on {addr}: {source}")]
pub struct BindError {
    pub kind: &'static str,
    pub addr: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

impl BindError {
    pub fn new(kind: &'static str, addr: SocketAddr, source: std::io::Error) -> Self {
        Self { kind, addr, source }
    }
}

impl From<BindError> for std::io::Error {
    fn from(e: BindError) -> Self {
        std::io::Error::other(e)
    }
}

/// A dispatcher dial to a backend failed. Reaps the backend (§4.4 step 4).
#[derive(Debug, Error)]
#[error("failed to dial backend {backend}: {source}")]
pub struct DialError {
    pub backend: String,
    #[source]
    pub source: std::io::Error,
}

impl From<DialError> for std::io::Error {
    fn from(e: DialError) -> Self {
        std::io::Error::other(e)
    }
}

/// Configuration failed to parse from the environment (§6).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a socket address (got {value:?}): {source}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{var} must be an integer: {source}")]
    InvalidInt {
        var: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}
