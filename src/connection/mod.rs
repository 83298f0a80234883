//! Connection lifecycle management on a single-task reactor.
//!
//! [`ConnectionManager`] owns every piece of per-connection protocol state:
//! the connection table, each connection's [`StreamReassembler`], the
//! [`ReliableDelivery`] tracker and the heartbeat bookkeeping. Socket and
//! timer tasks only forward events to it over a channel, so none of that
//! state is shared or locked.
//!
//! Frames are dispatched by type:
//!
//! - `Heartbeat`: refresh liveness and reply with `HeartbeatAck` at once.
//! - `HeartbeatAck`: refresh liveness.
//! - `Ack`: settle the matching pending delivery.
//! - `Data`: acknowledge, route to the [`Router`] and send any response
//!   through the reliable send path.
//!
//! [`StreamReassembler`]: crate::reassembler::StreamReassembler
//! [`ReliableDelivery`]: crate::delivery::ReliableDelivery
//! [`Router`]: crate::router::Router

mod event;
mod io;
mod reactor;
mod record;
mod state;

use std::{fmt, time::Duration};

pub use event::Command;
pub(crate) use event::ReactorEvent;
pub use reactor::ConnectionManager;
pub use state::ConnectionState;

use crate::codec::CodecError;

/// Identifier assigned to a connection when it is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "conn-{}", self.0) }
}

/// Why a connection was closed.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its end of the socket.
    PeerClosed,
    /// Reading from the socket failed.
    ReadFailed(std::io::Error),
    /// The peer sent bytes that break the protocol.
    ProtocolViolation(CodecError),
    /// No heartbeat arrived within the configured timeout.
    HeartbeatTimeout {
        /// Time since the last heartbeat.
        idle: Duration,
    },
    /// Closed on request through a [`Command`].
    Requested,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::ReadFailed(error) => write!(f, "read failed: {error}"),
            Self::ProtocolViolation(error) => write!(f, "protocol violation: {error}"),
            Self::HeartbeatTimeout { idle } => {
                write!(f, "heartbeat timeout after {}ms", idle.as_millis())
            }
            Self::Requested => f.write_str("close requested"),
            Self::Shutdown => f.write_str("server shutdown"),
        }
    }
}
