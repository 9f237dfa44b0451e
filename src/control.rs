//! Control channel (C2): typed command frames exchanged between the
//! coordinator and a single worker over an exclusive in-process PAIR pair.
//! See [`crate::transport::make_control_pair`] for how the pair itself is
//! created.

use crate::counters::Counters;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

/// Discriminator carried on the control channel. `StatsReply` additionally
/// carries a counters snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlFrame {
    Ready,
    Fail,
    Shutdown,
    Stats,
    StatsReply(Counters),
}

/// Sends `frame` non-blocking on `socket`.
pub fn send_command(socket: &zmq::Socket, frame: &ControlFrame) -> Result<(), GatewayError> {
    let bytes = bincode::serialize(frame)
        .map_err(|e| GatewayError::Fatal(format!("failed to encode control frame: {e}")))?;
    socket.send(bytes, zmq::DONTWAIT)?;
    Ok(())
}

/// Polls `socket` for up to `timeout_ms` and, if readable, receives and
/// decodes one frame. Returns `Ok(None)` on timeout with nothing pending.
pub fn recv_command(
    socket: &zmq::Socket,
    timeout_ms: i64,
) -> Result<Option<ControlFrame>, GatewayError> {
    let mut items = [socket.as_poll_item(zmq::POLLIN)];
    let rc = zmq::poll(&mut items, timeout_ms)?;
    if rc == 0 || (items[0].get_revents() & zmq::POLLIN).bits() == 0 {
        return Ok(None);
    }
    let bytes = socket.recv_bytes(zmq::DONTWAIT)?;
    let frame = bincode::deserialize(&bytes)
        .map_err(|e| GatewayError::Fatal(format!("failed to decode control frame: {e}")))?;
    Ok(Some(frame))
}

/// Drains every command currently pending on `socket` without blocking,
/// looping until the transport's pending-events bitmap no longer reports
/// POLLIN — the level-triggered-by-state contract described for this
/// channel: a single edge on the readiness fd may correspond to more than
/// one queued frame, so the caller must not re-arm its fd watcher until
/// this returns an empty vector.
pub fn drain_commands(socket: &zmq::Socket) -> Result<Vec<ControlFrame>, GatewayError> {
    let mut frames = Vec::new();
    loop {
        let events = socket.get_events()?;
        if (events & zmq::POLLIN).bits() == 0 {
            break;
        }
        let bytes = socket.recv_bytes(zmq::DONTWAIT)?;
        let frame = bincode::deserialize(&bytes)
            .map_err(|e| GatewayError::Fatal(format!("failed to decode control frame: {e}")))?;
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_over_inproc_pair() {
        let ctx = zmq::Context::new();
        let front = ctx.socket(zmq::PAIR).unwrap();
        front.bind("inproc://test-control-a").unwrap();
        let back = ctx.socket(zmq::PAIR).unwrap();
        back.connect("inproc://test-control-a").unwrap();

        send_command(&front, &ControlFrame::Shutdown).unwrap();
        let received = recv_command(&back, 1000).unwrap();
        assert_eq!(received, Some(ControlFrame::Shutdown));
    }

    #[test]
    fn stats_reply_carries_counters_snapshot() {
        let ctx = zmq::Context::new();
        let front = ctx.socket(zmq::PAIR).unwrap();
        front.bind("inproc://test-control-b").unwrap();
        let back = ctx.socket(zmq::PAIR).unwrap();
        back.connect("inproc://test-control-b").unwrap();

        let snapshot = Counters {
            requests: 10,
            code_200: 10,
            code_404: 0,
            code_412: 0,
            code_503: 0,
        };
        send_command(&back, &ControlFrame::StatsReply(snapshot)).unwrap();
        match recv_command(&front, 1000).unwrap() {
            Some(ControlFrame::StatsReply(c)) => assert_eq!(c, snapshot),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn drain_commands_returns_empty_when_nothing_pending() {
        let ctx = zmq::Context::new();
        let front = ctx.socket(zmq::PAIR).unwrap();
        front.bind("inproc://test-control-c").unwrap();
        let back = ctx.socket(zmq::PAIR).unwrap();
        back.connect("inproc://test-control-c").unwrap();

        assert!(drain_commands(&back).unwrap().is_empty());
    }

    #[test]
    fn drain_commands_pulls_every_queued_frame() {
        let ctx = zmq::Context::new();
        let front = ctx.socket(zmq::PAIR).unwrap();
        front.bind("inproc://test-control-d").unwrap();
        let back = ctx.socket(zmq::PAIR).unwrap();
        back.connect("inproc://test-control-d").unwrap();

        send_command(&front, &ControlFrame::Stats).unwrap();
        send_command(&front, &ControlFrame::Shutdown).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let frames = drain_commands(&back).unwrap();
        assert_eq!(frames, vec![ControlFrame::Stats, ControlFrame::Shutdown]);
    }
}
