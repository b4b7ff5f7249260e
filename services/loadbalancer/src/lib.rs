pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod health;
pub mod listeners;
pub mod pool;

pub use config::Config;
pub use pool::{Backend, PoolManager};
