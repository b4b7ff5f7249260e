//! The three accept loops: client sessions, backend registration, and
//! backend metrics. Each runs as its own long-lived task; a fatal bind
//! error terminates only that listener, and accept errors are logged
//! and the loop continues.

mod client;
mod metrics;
mod registration;

pub use client::{bind_client_listener, run_client_listener, serve_client_listener};
pub use metrics::run_metrics_listener;
pub use registration::run_registration_listener;
