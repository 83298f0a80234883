//! Command handle for a running server.

use tokio::sync::{mpsc, oneshot};

use super::ServerError;
use crate::{
    connection::{Command, ConnectionId},
    frame::Frame,
};

/// Cloneable sender of [`Command`]s to the reactor.
///
/// Frames sent through the handle take the reliable send path: they are
/// sequenced, tracked until acknowledged and retransmitted if necessary.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ServerHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self { Self { commands } }

    /// Send `frame` to every established connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stopped`] if the reactor has exited.
    pub fn broadcast(&self, frame: Frame) -> Result<(), ServerError> {
        self.submit(Command::Broadcast(frame))
    }

    /// Send `frame` to one connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stopped`] if the reactor has exited.
    pub fn send(&self, connection: ConnectionId, frame: Frame) -> Result<(), ServerError> {
        self.submit(Command::Send { connection, frame })
    }

    /// Close one connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stopped`] if the reactor has exited.
    pub fn close(&self, connection: ConnectionId) -> Result<(), ServerError> {
        self.submit(Command::Close(connection))
    }

    /// Ids of the established connections, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stopped`] if the reactor has exited or exits
    /// before answering.
    pub async fn active_connections(&self) -> Result<Vec<ConnectionId>, ServerError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::ActiveConnections(tx))?;
        rx.await.map_err(|_| ServerError::Stopped)
    }

    fn submit(&self, command: Command) -> Result<(), ServerError> {
        self.commands.send(command).map_err(|_| ServerError::Stopped)
    }
}
