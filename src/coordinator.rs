//! Coordinator (C4): creates the shared listening socket, spawns the
//! worker pool, services the monitor endpoint's `stats` command by
//! fan-out/fan-in over the control channel, and orchestrates teardown.

use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::GatewayConfig;
use crate::control::{self, ControlFrame};
use crate::counters::Counters;
use crate::error::GatewayError;
use crate::transport;
use crate::worker::{self, WorkerConfig};

const BRING_UP_TIMEOUT: Duration = Duration::from_secs(2);
const STATS_POLL_MS: i64 = 1000;
const STATS_RETRY_ROUNDS: usize = 5;
const LISTEN_BACKLOG: i32 = 1024;

/// Process-wide, single-writer-many-reader shutdown flag. Set by the
/// signal handler (see [`crate::lifecycle`]) or an unrecoverable
/// coordinator error; read by the parent loop.
pub fn new_shutdown_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

struct WorkerHandle {
    control_front: zmq::Socket,
    join: JoinHandle<()>,
}

/// Binds the shared HTTP listening socket: IPv4/IPv6, `SO_REUSEADDR`,
/// non-blocking, backlog 1024.
pub fn bind_listener(host: Option<&str>, port: u16) -> Result<StdTcpListener, GatewayError> {
    let addr_str = format!("{}:{}", host.unwrap_or("0.0.0.0"), port);
    let addr: std::net::SocketAddr = addr_str
        .parse()
        .map_err(|e| GatewayError::Config(format!("invalid bind address '{addr_str}': {e}")))?;

    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| GatewayError::Config(format!("failed to create listening socket: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| GatewayError::Config(format!("failed to set SO_REUSEADDR: {e}")))?;
    socket
        .bind(&addr.into())
        .map_err(|e| GatewayError::Config(format!("bind failed: {e}")))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| GatewayError::Config(format!("listen failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| GatewayError::Config(format!("failed to set nonblocking: {e}")))?;

    Ok(socket.into())
}

/// Spawns `config.worker_count` workers sharing `listener`, waits for each
/// to signal READY or FAIL within [`BRING_UP_TIMEOUT`], and returns the
/// handles for the ones that succeeded. If any worker fails or times out,
/// every already-created worker is torn down and an error is returned
/// without entering the parent loop.
fn spawn_workers(
    ctx: &zmq::Context,
    listener: &StdTcpListener,
    config: &GatewayConfig,
) -> Result<Vec<WorkerHandle>, GatewayError> {
    let mut handles = Vec::with_capacity(config.worker_count);

    for id in 0..config.worker_count {
        let (control_front, control_back) = transport::make_control_pair(ctx, id)?;
        let push = transport::make_push(ctx, &config.downstream)?;
        let worker_listener = listener
            .try_clone()
            .map_err(|e| GatewayError::BringUp { id, reason: e.to_string() })?;

        let worker_cfg = WorkerConfig {
            id,
            listener: worker_listener,
            include_headers: config.include_headers,
        };

        let join = std::thread::Builder::new()
            .name(format!("httpgw-worker-{id}"))
            .spawn(move || worker::run(worker_cfg, push, control_back))
            .map_err(|e| GatewayError::BringUp { id, reason: e.to_string() })?;

        match control::recv_command(&control_front, BRING_UP_TIMEOUT.as_millis() as i64) {
            Ok(Some(ControlFrame::Ready)) => {
                tracing::info!(worker = id, "worker bring-up complete");
                handles.push(WorkerHandle { control_front, join });
            }
            Ok(Some(ControlFrame::Fail)) | Ok(None) => {
                teardown(handles);
                let _ = join.join();
                return Err(GatewayError::BringUp {
                    id,
                    reason: "worker failed or timed out during bring-up".into(),
                });
            }
            Ok(Some(_other)) => {
                teardown(handles);
                return Err(GatewayError::BringUp {
                    id,
                    reason: "unexpected frame during bring-up".into(),
                });
            }
            Err(e) => {
                teardown(handles);
                return Err(GatewayError::BringUp { id, reason: e.to_string() });
            }
        }
    }

    Ok(handles)
}

/// Sends SHUTDOWN to every worker and joins its thread.
fn teardown(handles: Vec<WorkerHandle>) {
    for handle in &handles {
        let _ = control::send_command(&handle.control_front, &ControlFrame::Shutdown);
    }
    for handle in handles {
        let _ = handle.join.join();
    }
}

/// Services one `stats` request: fans STATS out to every worker front-end,
/// polls with a 1-second budget for up to 5 retry rounds, and aggregates
/// replies component-wise.
fn collect_stats(handles: &[WorkerHandle]) -> (Counters, usize) {
    let mut aggregate = Counters::new();
    let mut answered = vec![false; handles.len()];
    let mut remaining = handles.len();

    for handle in handles {
        let _ = control::send_command(&handle.control_front, &ControlFrame::Stats);
    }

    for _round in 0..STATS_RETRY_ROUNDS {
        if remaining == 0 {
            break;
        }
        for (i, handle) in handles.iter().enumerate() {
            if answered[i] {
                continue;
            }
            if let Ok(Some(ControlFrame::StatsReply(snapshot))) =
                control::recv_command(&handle.control_front, STATS_POLL_MS / handles.len().max(1) as i64)
            {
                aggregate.add_assign(&snapshot);
                answered[i] = true;
                remaining -= 1;
            }
        }
    }

    let responses = handles.len() - remaining;
    (aggregate, responses)
}

fn stats_to_xml(counters: &Counters, threads: usize, responses: usize) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n\
<httpush>\n\
  <statistics>\n\
    <threads>{threads}</threads>\n\
    <responses>{responses}</responses>\n\
    <requests>{}</requests>\n\
    <status code=\"200\">{}</status>\n\
    <status code=\"404\">{}</status>\n\
    <status code=\"412\">{}</status>\n\
    <status code=\"503\">{}</status>\n\
  </statistics>\n\
</httpush>\n",
        counters.requests, counters.code_200, counters.code_404, counters.code_412, counters.code_503
    )
}

/// Runs the coordinator end-to-end: bring up workers on the already-bound
/// `listener`, bring up the monitor endpoint, run the parent loop until
/// shutdown, tear down. The listener is bound by the caller (via
/// [`bind_listener`]) before privileges are dropped, matching the
/// bind-then-drop-privileges ordering of the original daemon.
pub fn run(
    config: GatewayConfig,
    listener: StdTcpListener,
    shutdown: Arc<AtomicBool>,
) -> Result<(), GatewayError> {
    let ctx = zmq::Context::new();
    ctx.set_io_threads(config.io_threads as i32).ok();

    let handles = spawn_workers(&ctx, &listener, &config)?;
    let worker_count = handles.len();

    let monitor = transport::make_monitor(&ctx, std::slice::from_ref(&config.monitor))?;
    tracing::info!(uri = %config.monitor.uri, "monitor endpoint bound");

    let mut items = [monitor.as_poll_item(zmq::POLLIN)];
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let rc = zmq::poll(&mut items, 250);
        match rc {
            Ok(n) if n > 0 && (items[0].get_revents() & zmq::POLLIN).bits() != 0 => {
                if let Err(e) = handle_monitor_request(&monitor, &handles, worker_count) {
                    tracing::warn!(error = %e, "failed to service monitor request");
                }
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "fatal error polling monitor socket");
                shutdown.store(true, Ordering::Release);
                break;
            }
        }
    }

    tracing::info!("shutting down");
    teardown(handles);
    Ok(())
}

fn handle_monitor_request(
    monitor: &zmq::Socket,
    handles: &[WorkerHandle],
    worker_count: usize,
) -> Result<(), GatewayError> {
    let (identity, payload) = transport::recv_addressed(monitor, 4096)?;
    if payload.len() < 5 || &payload[..5] != b"stats" {
        return Ok(());
    }

    let (aggregate, responses) = collect_stats(handles);
    let xml = stats_to_xml(&aggregate, worker_count, responses);
    transport::send_addressed(monitor, &identity, xml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_xml_matches_canonical_format() {
        let counters = Counters {
            requests: 10,
            code_200: 10,
            code_404: 0,
            code_412: 0,
            code_503: 0,
        };
        let xml = stats_to_xml(&counters, 2, 2);
        assert!(xml.contains("<threads>2</threads>"));
        assert!(xml.contains("<responses>2</responses>"));
        assert!(xml.contains("<requests>10</requests>"));
        assert!(xml.contains("<status code=\"200\">10</status>"));
    }
}
