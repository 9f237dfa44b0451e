//! # httpgw
//!
//! An HTTP ingress gateway that terminates HTTP requests across a pool of
//! worker threads and republishes each one as a ZeroMQ PUSH message,
//! exposing an aggregated-counters monitoring endpoint.

pub mod cli;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod counters;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod transport;
pub mod translator;
pub mod worker;

pub use cli::Args;
pub use config::GatewayConfig;
pub use error::GatewayError;

/// The current version of httpgw.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values matching the original daemon's defaults.
pub mod defaults {
    pub const BIND_PORT: u16 = 8080;
    pub const DOWNSTREAM_URI: &str = "tcp://127.0.0.1:5555";
    pub const MONITOR_URI: &str = "tcp://127.0.0.1:5567";
    pub const IO_THREADS: usize = 1;
    pub const WORKER_THREADS: usize = 5;
    pub const LINGER_MS: i32 = 2000;
}
