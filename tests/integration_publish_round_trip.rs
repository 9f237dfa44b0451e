//! End-to-end scenarios from the publish/monitor contract: a real HTTP
//! client talks to a real coordinator+worker pair over a loopback TCP
//! listener, and a real ZeroMQ PULL socket observes the downstream frames.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::time::Duration;

use httpgw::config::{EndpointDescriptor, GatewayConfig};
use httpgw::coordinator;

fn spawn_gateway(
    http_port: u16,
    downstream_port: u16,
    monitor_port: u16,
    include_headers: bool,
) -> (std::thread::JoinHandle<()>, std::sync::Arc<std::sync::atomic::AtomicBool>) {
    let config = GatewayConfig {
        bind_host: Some("127.0.0.1".to_string()),
        bind_port: http_port,
        downstream: vec![EndpointDescriptor::parse(
            &format!("tcp://127.0.0.1:{downstream_port}"),
            0,
            0,
        )
        .unwrap()],
        monitor: EndpointDescriptor::parse(&format!("tcp://127.0.0.1:{monitor_port}"), 0, 0)
            .unwrap(),
        io_threads: 1,
        worker_count: 1,
        include_headers,
        daemonize: false,
        user: None,
        group: None,
    };

    let listener = coordinator::bind_listener(config.bind_host.as_deref(), http_port).unwrap();
    let shutdown = coordinator::new_shutdown_flag();
    let shutdown_clone = shutdown.clone();
    let handle = std::thread::spawn(move || {
        coordinator::run(config, listener, shutdown_clone).unwrap();
    });

    (handle, shutdown)
}

fn http_post(port: u16, path: &str, body: &[u8]) -> (u16, String) {
    // Give the worker bring-up handshake time to complete before dialing.
    std::thread::sleep(Duration::from_millis(300));

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(request.as_bytes()).unwrap();
    stream.write_all(body).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).ok();

    let status = response
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .unwrap_or(0);
    // Split on the *first* blank line: the header/body boundary, not
    // wherever a later occurrence happens to land inside the body itself.
    let response_body = response
        .splitn(2, "\r\n\r\n")
        .nth(1)
        .unwrap_or("")
        .to_string();
    (status, response_body)
}

#[test]
fn body_only_publish_emits_single_frame() {
    let ctx = zmq::Context::new();
    let sink = ctx.socket(zmq::PULL).unwrap();
    sink.bind("tcp://127.0.0.1:18582").unwrap();

    let (handle, shutdown) = spawn_gateway(18581, 18582, 18583, false);

    let (status, body) = http_post(18581, "/", b"hello");
    assert_eq!(status, 200);
    assert_eq!(body, "Sent");

    sink.set_rcvtimeo(2000).unwrap();
    let frame = sink.recv_bytes(0).unwrap();
    assert_eq!(frame, b"hello");

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

#[test]
fn omit_headers_with_empty_body_is_precondition_failed() {
    let (handle, shutdown) = spawn_gateway(18591, 18592, 18593, false);

    let (status, body) = http_post(18591, "/", b"");
    assert_eq!(status, 412);
    assert_eq!(body, "Precondition Failed");

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

#[test]
fn reflect_route_is_counted_as_code_200() {
    let ctx = zmq::Context::new();
    let sink = ctx.socket(zmq::PULL).unwrap();
    sink.bind("tcp://127.0.0.1:18612").unwrap();

    let (handle, shutdown) = spawn_gateway(18611, 18612, 18613, false);

    let (status, body) = http_post(18611, "/reflect", b"hello");
    assert_eq!(status, 200);
    assert!(body.starts_with("POST /reflect HTTP/1.1\r\n"));
    assert!(body.contains("X-Forwarded-For: 127.0.0.1\r\n"));
    assert!(body.ends_with("--------\r\nhello\r\n--------\r\n"));

    let reply = query_stats(18613);
    assert!(reply.contains("<requests>1</requests>"));
    assert!(reply.contains("<status code=\"200\">1</status>"));

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

#[test]
fn hwm_exceeded_on_stalled_downstream_returns_503() {
    let ctx = zmq::Context::new();
    let sink = ctx.socket(zmq::PULL).unwrap();
    sink.bind("tcp://127.0.0.1:18622").unwrap();
    // Never drain `sink`: the downstream PUSH socket's local queue fills up
    // and, once past its 1-message high-water-mark, further sends must fail
    // with EAGAIN rather than block or silently drop.

    let config = GatewayConfig {
        bind_host: Some("127.0.0.1".to_string()),
        bind_port: 18621,
        downstream: vec![EndpointDescriptor::parse("tcp://127.0.0.1:18622?hwm=1", 0, 0).unwrap()],
        monitor: EndpointDescriptor::parse("tcp://127.0.0.1:18623", 0, 0).unwrap(),
        io_threads: 1,
        worker_count: 1,
        include_headers: false,
        daemonize: false,
        user: None,
        group: None,
    };

    let listener = coordinator::bind_listener(config.bind_host.as_deref(), 18621).unwrap();
    let shutdown = coordinator::new_shutdown_flag();
    let shutdown_clone = shutdown.clone();
    let handle = std::thread::spawn(move || {
        coordinator::run(config, listener, shutdown_clone).unwrap();
    });

    std::thread::sleep(Duration::from_millis(300));

    // Large bodies over a hwm=1 connection with nobody draining the sink
    // exhaust the pipe's buffering quickly; 30 attempts is comfortably past
    // any plausible loopback TCP send-buffer size.
    let oversized_body = vec![b'x'; 256 * 1024];
    let mut statuses = Vec::new();
    for _ in 0..30 {
        let (status, _) = http_post_no_delay(18621, "/", &oversized_body);
        statuses.push(status);
        if status == 503 {
            break;
        }
    }
    assert!(
        statuses.iter().any(|&s| s == 503),
        "expected at least one 503 once the downstream queue saturates, got {statuses:?}"
    );

    let reply = query_stats(18623);
    assert!(reply.contains(&format!("<requests>{}</requests>", statuses.len())));

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

fn http_post_no_delay(port: u16, path: &str, body: &[u8]) -> (u16, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(request.as_bytes()).unwrap();
    stream.write_all(body).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).ok();

    let status = response
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .unwrap_or(0);
    let response_body = response
        .splitn(2, "\r\n\r\n")
        .nth(1)
        .unwrap_or("")
        .to_string();
    (status, response_body)
}

fn query_stats(monitor_port: u16) -> String {
    let ctx = zmq::Context::new();
    let dealer = ctx.socket(zmq::DEALER).unwrap();
    dealer
        .connect(&format!("tcp://127.0.0.1:{monitor_port}"))
        .unwrap();
    dealer.set_rcvtimeo(3000).unwrap();

    dealer.send(&[][..], zmq::SNDMORE).unwrap();
    dealer.send(&b"stats"[..], 0).unwrap();

    let _delimiter = dealer.recv_bytes(0).unwrap();
    let reply = dealer.recv_bytes(0).unwrap();
    String::from_utf8(reply).unwrap()
}

#[test]
fn include_headers_sends_header_and_body_frames() {
    let ctx = zmq::Context::new();
    let sink = ctx.socket(zmq::PULL).unwrap();
    sink.bind("tcp://127.0.0.1:18602").unwrap();

    let (handle, shutdown) = spawn_gateway(18601, 18602, 18603, true);

    let (status, _) = http_post(18601, "/", b"hello");
    assert_eq!(status, 200);

    sink.set_rcvtimeo(2000).unwrap();
    let header = sink.recv_bytes(0).unwrap();
    let header = String::from_utf8(header).unwrap();
    assert!(header.starts_with("POST / HTTP/1.1\r\n"));
    assert!(header.contains("X-Forwarded-For: 127.0.0.1\r\n"));
    assert!(sink.get_rcvmore().unwrap());

    let body = sink.recv_bytes(0).unwrap();
    assert_eq!(body, b"hello");

    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}
