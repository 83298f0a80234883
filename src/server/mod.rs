//! TCP server wiring the listener, the reactor and its command channel.
//!
//! [`Server`] carries a typestate `S` recording whether it has been bound to
//! a listener. New servers start [`Unbound`]; [`Server::bind`] or
//! [`Server::bind_existing_listener`] produce a [`Bound`] server, and only a
//! bound server can run. A [`ServerHandle`] taken before running lets other
//! tasks broadcast, send to a single connection, close connections and list
//! the active ones while the reactor is live.

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
};

use crate::{config::ServerConfig, connection::Command, router::Router};

pub mod error;
mod handle;
mod runtime;

pub use error::ServerError;
pub use handle::ServerHandle;
pub use runtime::BackoffConfig;

/// Message server built around a [`Router`].
///
/// # Examples
///
/// ```no_run
/// use ackwire::{
///     config::ServerConfig,
///     frame::Frame,
///     router::ServiceRouter,
///     server::Server,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ackwire::server::ServerError> {
/// let router = ServiceRouter::new()
///     .route(1, |_, frame: &Frame| Ok(frame.body.clone()))
///     .expect("service 1 is free");
/// let config = ServerConfig::default();
/// Server::new(config, router).bind(config.listen)?.run().await
/// # }
/// ```
pub struct Server<R, S = Unbound>
where
    S: ServerState,
{
    pub(crate) config: ServerConfig,
    pub(crate) router: R,
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) commands_tx: mpsc::UnboundedSender<Command>,
    pub(crate) commands_rx: mpsc::UnboundedReceiver<Command>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl<R: Router> Server<R, Unbound> {
    /// Create an unbound server.
    #[must_use]
    pub fn new(config: ServerConfig, router: R) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            config: config.normalized(),
            router,
            ready_tx: None,
            commands_tx,
            commands_rx,
            state: Unbound,
        }
    }

    /// Always `None`: the server is not bound yet.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind a fresh listener to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<Server<R, Bound>, ServerError> {
        let listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_existing_listener(listener)
    }

    /// Take over an already bound standard library listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be registered
    /// with the runtime. Must be called within a Tokio runtime.
    pub fn bind_existing_listener(
        self,
        listener: StdTcpListener,
    ) -> Result<Server<R, Bound>, ServerError> {
        listener.set_nonblocking(true).map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(listener).map_err(ServerError::Bind)?;
        let Self {
            mut config,
            router,
            ready_tx,
            commands_tx,
            commands_rx,
            ..
        } = self;
        if let Ok(addr) = listener.local_addr() {
            config.listen = addr;
        }
        Ok(Server {
            config,
            router,
            ready_tx,
            commands_tx,
            commands_rx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl<R> Server<R, Bound> {
    /// Address the listener is bound to, or `None` if it cannot be read.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}

impl<R, S: ServerState> Server<R, S> {
    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Handle for issuing commands to the running server.
    #[must_use]
    pub fn handle(&self) -> ServerHandle { ServerHandle::new(self.commands_tx.clone()) }

    /// Notify `tx` once the server has started accepting connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }
}
