//! Command-line surface, following the option set of the original httpush
//! daemon byte-for-byte while using clap's derive API in the teacher's style.

use crate::config::{parse_size_suffix, EndpointDescriptor, GatewayConfig};
use crate::defaults;
use crate::error::GatewayError;
use clap::builder::Styles;
use clap::Parser;

/// Returns the ANSI color styling used for `--help` output.
fn styles() -> Styles {
    Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default())
        .usage(clap::builder::styling::AnsiColor::Green.on_default())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default())
        .placeholder(clap::builder::styling::AnsiColor::Cyan.on_default())
}

/// HTTP ingress gateway that republishes requests onto a downstream
/// ZeroMQ PUSH fan-out and exposes an aggregated-counters monitor endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, styles = styles())]
pub struct Args {
    /// Hostname or address for the HTTP listener (default: all interfaces)
    #[arg(short = 'b', long = "bind")]
    pub bind_host: Option<String>,

    /// HTTP listen port
    #[arg(short = 'p', long = "port", default_value_t = defaults::BIND_PORT)]
    pub port: u16,

    /// Comma-separated list of downstream ZeroMQ URIs, each optionally
    /// carrying `?hwm=&swap=&linger=` overrides
    #[arg(short = 'z', long = "downstream", default_value = defaults::DOWNSTREAM_URI)]
    pub downstream: String,

    /// Monitor bind URI
    #[arg(short = 'm', long = "monitor", default_value = defaults::MONITOR_URI)]
    pub monitor: String,

    /// Global default high-water-mark for downstream endpoints
    #[arg(short = 'w', long = "hwm", default_value_t = 0)]
    pub hwm: u64,

    /// Global default swap size; accepts suffixes B/K/M/G (base 1024)
    #[arg(short = 's', long = "swap", default_value = "0")]
    pub swap: String,

    /// Global default linger in milliseconds
    #[arg(short = 'l', long = "linger", default_value_t = defaults::LINGER_MS)]
    pub linger: i32,

    /// Number of ZeroMQ I/O threads
    #[arg(short = 'i', long = "io-threads", default_value_t = defaults::IO_THREADS)]
    pub io_threads: usize,

    /// Number of HTTP worker threads
    #[arg(short = 't', long = "threads", default_value_t = defaults::WORKER_THREADS)]
    pub threads: usize,

    /// Omit the header frame; publish body only
    #[arg(short = 'o', long = "omit-headers")]
    pub omit_headers: bool,

    /// Daemonize: fork, new session, redirect stdio to /dev/null, chdir
    #[arg(short = 'd', long = "daemonize")]
    pub daemonize: bool,

    /// User to run as after binding
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Group to run as after binding
    #[arg(short = 'g', long = "group")]
    pub group: Option<String>,

    /// Increase log verbosity (repeatable: info -> debug -> trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the human-formatted startup/shutdown banner on stdout
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Args {
    /// Translates parsed arguments into a [`GatewayConfig`], resolving size
    /// suffixes and per-endpoint overrides.
    pub fn into_config(self) -> Result<GatewayConfig, GatewayError> {
        let default_swap = parse_size_suffix(&self.swap)?;
        let downstream =
            EndpointDescriptor::parse_list(&self.downstream, self.hwm, default_swap)?;
        if downstream.is_empty() {
            return Err(GatewayError::Config(
                "at least one downstream endpoint is required".into(),
            ));
        }
        let monitor = EndpointDescriptor::parse(&self.monitor, self.hwm, default_swap)?;

        if self.io_threads < 1 {
            return Err(GatewayError::Config(
                "io-threads must be a positive integer".into(),
            ));
        }
        if self.threads < 1 {
            return Err(GatewayError::Config(
                "threads must be a positive integer".into(),
            ));
        }

        Ok(GatewayConfig {
            bind_host: self.bind_host,
            bind_port: self.port,
            downstream,
            monitor,
            io_threads: self.io_threads,
            worker_count: self.threads,
            include_headers: !self.omit_headers,
            daemonize: self.daemonize,
            user: self.user,
            group: self.group,
        })
    }
}
