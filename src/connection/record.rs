//! Per-connection state owned by the reactor.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use super::{ConnectionId, ConnectionState};
use crate::{
    codec::encode_into,
    frame::Frame,
    metrics::{self, Direction},
    reassembler::StreamReassembler,
};

/// Everything the reactor knows about one live connection.
#[derive(Debug)]
pub(crate) struct ConnectionRecord {
    pub(crate) id: ConnectionId,
    pub(crate) peer: SocketAddr,
    pub(crate) state: ConnectionState,
    pub(crate) reassembler: StreamReassembler,
    pub(crate) last_heartbeat: Instant,
    outbound: mpsc::UnboundedSender<Bytes>,
    token: CancellationToken,
    max_frame_length: usize,
}

impl ConnectionRecord {
    pub(crate) fn new(
        id: ConnectionId,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
        token: CancellationToken,
        max_frame_length: usize,
    ) -> Self {
        Self {
            id,
            peer,
            state: ConnectionState::Connecting,
            reassembler: StreamReassembler::new(max_frame_length),
            last_heartbeat: Instant::now(),
            outbound,
            token,
            max_frame_length,
        }
    }

    /// Encode `frame` and queue it for the writer task.
    ///
    /// Returns `false` if the frame could not be encoded or the writer has
    /// gone away.
    pub(crate) fn write_frame(&self, frame: &Frame) -> bool {
        let mut buf = BytesMut::new();
        if let Err(error) = encode_into(frame, &mut buf, self.max_frame_length) {
            tracing::warn!(
                connection = %self.id,
                sequence = frame.sequence,
                service_id = frame.service_id,
                %error,
                "failed to encode outbound frame"
            );
            return false;
        }
        if self.outbound.send(buf.freeze()).is_err() {
            tracing::debug!(connection = %self.id, "writer closed; frame dropped");
            return false;
        }
        metrics::inc_frames(Direction::Outbound);
        tracing::debug!(
            connection = %self.id,
            sequence = frame.sequence,
            frame_type = ?frame.frame_type,
            "frame queued"
        );
        true
    }

    pub(crate) fn touch(&mut self, now: Instant) { self.last_heartbeat = now; }

    /// Cancel the socket and timer tasks tied to this connection.
    pub(crate) fn cancel_tasks(&self) { self.token.cancel(); }
}
