//! Worker (C3): one HTTP event loop bound to the shared listening
//! descriptor, owning one downstream push endpoint and one control-channel
//! back-end. Each worker gets its own OS thread and its own single-threaded
//! Tokio runtime — generalizing the teacher's `spawn_with_affinity` pattern
//! (`utils.rs`) to "always a dedicated thread, never a shared runtime",
//! which is what the concurrency model in this crate requires.

use std::convert::Infallible;
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use tokio::sync::oneshot;

use crate::control::ControlFrame;
use crate::counters::Counters;
use crate::transport::{self};
use crate::translator::{self, Frames, RequestView, Verdict};

const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_millis(50);
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Everything a worker needs at bring-up. The listener is shared (cloned
/// fd) across all workers; the push and control sockets are exclusively
/// owned by this worker from construction onward.
pub struct WorkerConfig {
    pub id: usize,
    pub listener: StdTcpListener,
    pub include_headers: bool,
}

/// Runs one worker to completion. Blocks the calling thread; intended to be
/// the body of a dedicated `std::thread::spawn` closure.
///
/// `push` and `control_back` must be created on this same thread (zmq
/// sockets are not thread-safe and must never cross threads).
pub fn run(cfg: WorkerConfig, push: zmq::Socket, control_back: zmq::Socket) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(worker = cfg.id, error = %e, "failed to build worker runtime");
            let _ = crate::control::send_command(&control_back, &ControlFrame::Fail);
            return;
        }
    };

    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, serve(cfg, push, control_back));
}

/// Executes hyper connection futures on the worker's single-threaded runtime
/// via `spawn_local`, since `push` (an `Arc<zmq::Socket>`) is not `Send` and
/// hyper's default executor requires it.
#[derive(Clone, Copy, Debug)]
struct LocalExec;

impl<F> hyper::rt::Executor<F> for LocalExec
where
    F: std::future::Future + 'static,
{
    fn execute(&self, fut: F) {
        tokio::task::spawn_local(fut);
    }
}

async fn serve(cfg: WorkerConfig, push: zmq::Socket, control_back: zmq::Socket) {
    let id = cfg.id;
    cfg.listener.set_nonblocking(true).ok();
    let listener = match tokio::net::TcpListener::from_std(cfg.listener) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(worker = id, error = %e, "failed to adopt shared listener");
            let _ = crate::control::send_command(&control_back, &ControlFrame::Fail);
            return;
        }
    };
    let incoming = match hyper::server::conn::AddrIncoming::from_listener(listener) {
        Ok(i) => i,
        Err(e) => {
            tracing::error!(worker = id, error = %e, "failed to wrap shared listener");
            let _ = crate::control::send_command(&control_back, &ControlFrame::Fail);
            return;
        }
    };

    let counters = Arc::new(Mutex::new(Counters::new()));
    let push = Arc::new(push);
    let include_headers = cfg.include_headers;

    let make_svc = {
        let counters = counters.clone();
        let push = push.clone();
        make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let remote_host = conn.remote_addr().ip().to_string();
            let counters = counters.clone();
            let push = push.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let counters = counters.clone();
                    let push = push.clone();
                    let remote_host = remote_host.clone();
                    handle(req, remote_host, include_headers, push, counters)
                }))
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let stop = Arc::new(AtomicBool::new(false));
    let control_thread =
        spawn_control_thread(id, control_back, counters.clone(), shutdown_tx, stop.clone());

    let server = Server::builder(incoming)
        .http1_only(true)
        .executor(LocalExec)
        .serve(make_svc)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

    tracing::info!(worker = id, "worker ready");

    if let Err(e) = server.await {
        tracing::error!(worker = id, error = %e, "http server exited with error");
    }

    stop.store(true, Ordering::Release);
    let _ = control_thread.join();

    tracing::info!(worker = id, "worker terminated");
}

/// Spawns the dedicated OS thread that services this worker's control
/// channel and sends the READY handshake frame once it starts reading. The
/// PAIR socket's read is a blocking `zmq::poll` call
/// ([`crate::control::recv_command`]); running it on the worker's
/// single-threaded Tokio runtime would stall HTTP accept/response
/// processing for up to its timeout on every iteration, so it instead runs
/// on its own thread and reaches back into the runtime only through a
/// `oneshot` channel (SHUTDOWN) and a shared `Mutex<Counters>` (STATS).
fn spawn_control_thread(
    id: usize,
    control_back: zmq::Socket,
    counters: Arc<Mutex<Counters>>,
    shutdown_tx: oneshot::Sender<()>,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("httpgw-worker-{id}-control"))
        .spawn(move || {
            let _ = crate::control::send_command(&control_back, &ControlFrame::Ready);
            run_control_loop(&control_back, &counters, shutdown_tx, &stop);
        })
        .unwrap_or_else(|e| {
            tracing::error!(worker = id, error = %e, "failed to spawn control thread");
            std::thread::spawn(|| {})
        })
}

/// Drives the control-channel back-end on its own thread: waits for a
/// command to arrive, then drains every remaining pending command to
/// state-empty before waiting again (see [`crate::control::drain_commands`]).
/// Exits on SHUTDOWN or when `stop` is set by the caller (i.e. the HTTP
/// server already exited for an unrelated reason).
fn run_control_loop(
    control_back: &zmq::Socket,
    counters: &Mutex<Counters>,
    shutdown_tx: oneshot::Sender<()>,
    stop: &AtomicBool,
) {
    let mut shutdown_tx = Some(shutdown_tx);
    while !stop.load(Ordering::Acquire) {
        let first = crate::control::recv_command(control_back, 100);
        let frames = match first {
            Ok(Some(first)) => {
                let mut frames = vec![first];
                if let Ok(rest) = crate::control::drain_commands(control_back) {
                    frames.extend(rest);
                }
                frames
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "control channel read failed");
                Vec::new()
            }
        };

        for frame in frames {
            match frame {
                ControlFrame::Shutdown => {
                    std::thread::sleep(SHUTDOWN_GRACE);
                    if let Some(tx) = shutdown_tx.take() {
                        let _ = tx.send(());
                    }
                    return;
                }
                ControlFrame::Stats => {
                    let snapshot = *counters.lock().unwrap();
                    let _ = crate::control::send_command(
                        control_back,
                        &ControlFrame::StatsReply(snapshot),
                    );
                }
                _ => {}
            }
        }
    }
}

async fn handle(
    req: Request<Body>,
    remote_host: String,
    include_headers: bool,
    push: Arc<zmq::Socket>,
    counters: Arc<Mutex<Counters>>,
) -> Result<Response<Body>, Infallible> {
    counters.lock().unwrap().requests += 1;

    let is_reflect = req.uri().path() == "/reflect";

    let method = req.method().as_str().to_string();
    let uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let body_bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) if bytes.len() <= MAX_BODY_BYTES => bytes.to_vec(),
        _ => {
            counters.lock().unwrap().code_503 += 1;
            return Ok(status_response(
                hyper::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ));
        }
    };

    let view = RequestView {
        method: &method,
        uri: &uri,
        headers: &headers,
        remote_host: &remote_host,
        body: &body_bytes,
    };

    if is_reflect {
        counters.lock().unwrap().code_200 += 1;
        return Ok(reflect(&view));
    }

    let (frames, verdict) = translator::translate(&view, include_headers);

    if verdict == Verdict::PreconditionFailed {
        counters.lock().unwrap().code_412 += 1;
        return Ok(status_response(
            hyper::StatusCode::PRECONDITION_FAILED,
            "Precondition Failed",
        ));
    }

    let send_result = match frames {
        Frames::Single(body) => transport::send_frame(&push, &body, false),
        Frames::Pair(header, body) => transport::send_frame(&push, &header, true)
            .and_then(|_| transport::send_frame(&push, &body, false)),
    };

    match send_result {
        Ok(()) => {
            counters.lock().unwrap().code_200 += 1;
            Ok(status_response(hyper::StatusCode::OK, "Sent"))
        }
        Err(_) => {
            counters.lock().unwrap().code_503 += 1;
            Ok(status_response(
                hyper::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ))
        }
    }
}

/// The debug dump route: reuses [`translator::header_frame`] (the same
/// canonical form and X-Forwarded-For merge rule the publish path sends
/// downstream) so the two never drift, followed by a separator, the raw
/// body, and a closing separator.
fn reflect(view: &RequestView<'_>) -> Response<Body> {
    let mut dump = translator::header_frame(view);
    dump.extend_from_slice(b"\r\n--------\r\n");
    dump.extend_from_slice(view.body);
    dump.extend_from_slice(b"\r\n--------\r\n");

    Response::builder()
        .status(hyper::StatusCode::OK)
        .header("content-type", "text/plain")
        .body(Body::from(dump))
        .unwrap()
}

fn status_response(status: hyper::StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .unwrap()
}
