//! Parsed, immutable configuration derived from [`crate::cli::Args`].

use crate::error::GatewayError;

/// Default linger applied to any endpoint whose URI does not override it.
pub const DEFAULT_LINGER_MS: i32 = 2000;

/// An immutable downstream (or monitor) endpoint: a transport URI plus the
/// buffering policy to apply to it before bind/connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub uri: String,
    pub hwm: u64,
    pub swap: i64,
    pub linger_ms: i32,
}

impl EndpointDescriptor {
    /// Parses a single endpoint, e.g. `tcp://127.0.0.1:5555?hwm=10&swap=1M&linger=500`.
    ///
    /// Query parameters not present fall back to the supplied global
    /// defaults, mirroring the `hp_parse_uri` override behavior.
    pub fn parse(raw: &str, default_hwm: u64, default_swap: i64) -> Result<Self, GatewayError> {
        let mut parts = raw.splitn(2, '?');
        let uri = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config(format!("empty endpoint uri in '{raw}'")))?
            .to_string();

        let mut hwm = default_hwm;
        let mut swap = default_swap;
        let mut linger_ms = DEFAULT_LINGER_MS;

        if let Some(query) = parts.next() {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let mut kv = pair.splitn(2, '=');
                let key = kv.next().unwrap_or("");
                let value = kv.next().unwrap_or("");
                match key {
                    "hwm" => {
                        hwm = value.parse::<u64>().map_err(|_| {
                            GatewayError::Config(format!("invalid hwm value '{value}'"))
                        })?;
                    }
                    "swap" => {
                        swap = parse_size_suffix(value)?;
                    }
                    "linger" => {
                        linger_ms = value.parse::<i32>().map_err(|_| {
                            GatewayError::Config(format!("invalid linger value '{value}'"))
                        })?;
                    }
                    _ => {}
                }
            }
        }

        Ok(EndpointDescriptor {
            uri,
            hwm,
            swap,
            linger_ms,
        })
    }

    /// Parses a comma-separated list of endpoints, e.g. the `-z` CLI value.
    pub fn parse_list(
        raw: &str,
        default_hwm: u64,
        default_swap: i64,
    ) -> Result<Vec<Self>, GatewayError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Self::parse(s, default_hwm, default_swap))
            .collect()
    }
}

/// Parses a size expression with an optional base-1024 suffix: `B`, `K`, `M`, `G`.
/// A bare integer is interpreted as bytes.
pub fn parse_size_suffix(expr: &str) -> Result<i64, GatewayError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(GatewayError::Config("empty size expression".into()));
    }

    let (digits, suffix) = match expr.find(|c: char| !c.is_ascii_digit() && c != '-' && c != '+')
    {
        Some(idx) => expr.split_at(idx),
        None => (expr, ""),
    };

    let base: i64 = digits
        .parse()
        .map_err(|_| GatewayError::Config(format!("invalid size expression '{expr}'")))?;

    let factor: i64 = match suffix {
        "" => 1,
        "B" | "b" => 1,
        "K" | "k" => 1024,
        "M" | "m" => 1024 * 1024,
        "G" | "g" => 1024 * 1024 * 1024,
        other => {
            return Err(GatewayError::Config(format!(
                "unknown size unit '{other}' in '{expr}'"
            )))
        }
    };

    Ok(base * factor)
}

/// Fully resolved, immutable gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_host: Option<String>,
    pub bind_port: u16,
    pub downstream: Vec<EndpointDescriptor>,
    pub monitor: EndpointDescriptor,
    pub io_threads: usize,
    pub worker_count: usize,
    pub include_headers: bool,
    pub daemonize: bool,
    pub user: Option<String>,
    pub group: Option<String>,
}
