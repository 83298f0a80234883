//! Messages delivered to the reactor loop.

use std::{io, net::SocketAddr};

use bytes::Bytes;
use tokio::{net::TcpStream, sync::oneshot};

use super::ConnectionId;
use crate::frame::Frame;

/// Events produced by socket, timer and accept tasks.
#[derive(Debug)]
pub(crate) enum ReactorEvent {
    /// A new TCP connection was accepted.
    Accepted { stream: TcpStream, peer: SocketAddr },
    /// Bytes were read from the socket.
    Readable { id: ConnectionId, chunk: Bytes },
    /// The read half reached EOF or failed.
    Disconnected {
        id: ConnectionId,
        error: Option<io::Error>,
    },
    /// The outbound heartbeat interval elapsed.
    HeartbeatDue(ConnectionId),
    /// The heartbeat timeout check interval elapsed.
    HeartbeatCheck(ConnectionId),
}

/// Requests from outside the reactor.
///
/// Usually sent through a [`ServerHandle`](crate::server::ServerHandle).
#[derive(Debug)]
pub enum Command {
    /// Send `frame` to every established connection.
    Broadcast(Frame),
    /// Send `frame` to one connection.
    Send {
        /// Target connection.
        connection: ConnectionId,
        /// Frame to send; its sequence is assigned by the reactor.
        frame: Frame,
    },
    /// Close a connection.
    Close(ConnectionId),
    /// Report the ids of all established connections.
    ActiveConnections(oneshot::Sender<Vec<ConnectionId>>),
}
