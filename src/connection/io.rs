//! Socket and timer tasks feeding the reactor.
//!
//! Each connection gets a reader, a writer and a heartbeat timer task. They
//! own no protocol state: readers forward raw chunks, timers forward ticks
//! and the writer drains an mpsc queue of already encoded frames. Every task
//! stops when the connection's cancellation token fires.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    select,
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{ConnectionId, event::ReactorEvent};

const READ_CHUNK: usize = 4096;

/// Forward bytes read from `reader` to the reactor until EOF, error or
/// cancellation.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(super) async fn read_loop(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<ReactorEvent>,
    token: CancellationToken,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        let read = select! {
            biased;

            () = token.cancelled() => return,
            res = reader.read_buf(&mut buf) => res,
        };
        let event = match read {
            Ok(0) => ReactorEvent::Disconnected { id, error: None },
            Ok(_) => ReactorEvent::Readable {
                id,
                chunk: buf.split().freeze(),
            },
            Err(error) => ReactorEvent::Disconnected {
                id,
                error: Some(error),
            },
        };
        let done = matches!(event, ReactorEvent::Disconnected { .. });
        if events.send(event).is_err() || done {
            return;
        }
        buf.reserve(READ_CHUNK);
    }
}

/// Write queued frames to `writer` in order.
///
/// Frames already queued when the connection closes are still flushed; the
/// write half is then shut down.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(super) async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    token: CancellationToken,
) {
    loop {
        let next = select! {
            biased;

            next = outbound.recv() => next,
            () = token.cancelled() => None,
        };
        let Some(bytes) = next else { break };
        if let Err(error) = writer.write_all(&bytes).await {
            tracing::debug!(connection = %id, %error, "write failed");
            break;
        }
    }
    if let Err(error) = writer.shutdown().await {
        tracing::trace!(connection = %id, %error, "shutdown of write half failed");
    }
}

/// Tick the outbound heartbeat and the liveness check for one connection.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub(super) async fn heartbeat_timers(
    id: ConnectionId,
    send_every: Duration,
    check_every: Duration,
    events: mpsc::UnboundedSender<ReactorEvent>,
    token: CancellationToken,
) {
    let start = Instant::now();
    let mut send = time::interval_at(start + send_every, send_every);
    let mut check = time::interval_at(start + check_every, check_every);
    send.set_missed_tick_behavior(MissedTickBehavior::Delay);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let event = select! {
            biased;

            () = token.cancelled() => return,
            _ = check.tick() => ReactorEvent::HeartbeatCheck(id),
            _ = send.tick() => ReactorEvent::HeartbeatDue(id),
        };
        if events.send(event).is_err() {
            return;
        }
    }
}
