//! Messaging endpoints (C1): a thin, gateway-specific wrapper over the
//! `zmq` crate's socket API. Mirrors the capability set the teacher's
//! `IpcTransport` trait abstracts over (create, configure, bind/connect,
//! send, receive, close) but is specialized to the three socket kinds the
//! gateway needs rather than generic over a transport enum.

use crate::config::EndpointDescriptor;
use crate::error::GatewayError;

/// Ceiling on an addressed message's identity frame, matching the
/// monitoring parser's documented limit in the original implementation.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Creates a PUSH socket connected, in order, to every endpoint in
/// `endpoints`. Each endpoint's hwm/swap/linger are applied before the
/// connect call, matching `hp_create_socket`'s configure-before-connect
/// ordering. Fails and closes the partially configured socket if any
/// connect fails.
pub fn make_push(ctx: &zmq::Context, endpoints: &[EndpointDescriptor]) -> Result<zmq::Socket, GatewayError> {
    let socket = ctx.socket(zmq::PUSH)?;
    for ep in endpoints {
        configure(&socket, ep)?;
        socket.connect(&ep.uri).map_err(|source| GatewayError::Bind {
            uri: ep.uri.clone(),
            source,
        })?;
    }
    Ok(socket)
}

/// Creates a ROUTER socket bound, in order, to every endpoint in `endpoints`.
pub fn make_monitor(ctx: &zmq::Context, endpoints: &[EndpointDescriptor]) -> Result<zmq::Socket, GatewayError> {
    let socket = ctx.socket(zmq::ROUTER)?;
    for ep in endpoints {
        configure(&socket, ep)?;
        socket.bind(&ep.uri).map_err(|source| GatewayError::Bind {
            uri: ep.uri.clone(),
            source,
        })?;
    }
    Ok(socket)
}

/// Creates an exclusive in-process PAIR pair addressed by `id`, returning
/// `(front, back)` — front bound (coordinator-owned), back connected
/// (worker-owned).
pub fn make_control_pair(ctx: &zmq::Context, id: usize) -> Result<(zmq::Socket, zmq::Socket), GatewayError> {
    let uri = format!("inproc://httpgw/control-{id}");
    let front = ctx.socket(zmq::PAIR)?;
    front.bind(&uri).map_err(|source| GatewayError::Bind {
        uri: uri.clone(),
        source,
    })?;
    let back = ctx.socket(zmq::PAIR)?;
    back.connect(&uri).map_err(|source| GatewayError::Bind {
        uri: uri.clone(),
        source,
    })?;
    Ok((front, back))
}

fn configure(socket: &zmq::Socket, ep: &EndpointDescriptor) -> Result<(), GatewayError> {
    socket.set_sndhwm(ep.hwm as i32)?;
    socket.set_linger(ep.linger_ms)?;
    // `swap` has no equivalent in modern libzmq (ZMQ_SWAP was removed in
    // 3.x); the value is still parsed and carried for wire-format fidelity.
    let _ = ep.swap;
    Ok(())
}

/// Sends `bytes` non-blocking, optionally with the more-follows bit set.
/// Returns `Ok(())` on success; an `EAGAIN` from the kernel/libzmq is
/// reported as [`GatewayError::Transient`], any other failure as
/// [`GatewayError::Transport`].
pub fn send_frame(socket: &zmq::Socket, bytes: &[u8], more: bool) -> Result<(), GatewayError> {
    let mut flags = zmq::DONTWAIT;
    if more {
        flags |= zmq::SNDMORE;
    }
    match socket.send(bytes, flags) {
        Ok(()) => Ok(()),
        Err(zmq::Error::EAGAIN) => Err(GatewayError::Transient),
        Err(other) => Err(GatewayError::Transport(other)),
    }
}

/// Receives an addressed request: `{identity, empty delimiter, payload...}`.
/// Concatenates any multi-part payload, rejecting input whose payload
/// exceeds `max_payload` or whose identity exceeds [`MAX_IDENTITY_LEN`].
pub fn recv_addressed(
    socket: &zmq::Socket,
    max_payload: usize,
) -> Result<(Vec<u8>, Vec<u8>), GatewayError> {
    let identity = socket.recv_bytes(0)?;
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(GatewayError::Transport(zmq::Error::EINVAL));
    }

    if socket.get_rcvmore()? {
        let _delimiter = socket.recv_bytes(0)?;
    }

    let mut payload = Vec::new();
    let mut more = socket.get_rcvmore()?;
    while more {
        let part = socket.recv_bytes(0)?;
        if payload.len() + part.len() > max_payload {
            return Err(GatewayError::Transport(zmq::Error::EINVAL));
        }
        payload.extend_from_slice(&part);
        more = socket.get_rcvmore()?;
    }

    Ok((identity, payload))
}

/// Emits `{identity, empty delimiter, payload}` addressed to `identity`.
pub fn send_addressed(socket: &zmq::Socket, identity: &[u8], payload: &[u8]) -> Result<(), GatewayError> {
    socket.send(identity, zmq::SNDMORE)?;
    socket.send(&[][..], zmq::SNDMORE)?;
    socket.send(payload, 0)?;
    Ok(())
}
