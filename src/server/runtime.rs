//! Runtime control for [`Server`].

mod accept;
mod backoff;

use std::future::Future;

pub(super) use accept::{AcceptListener, AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use log::warn;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use super::{Bound, Server, ServerError};
use crate::{connection::ConnectionManager, router::Router};

impl<R> Server<R, Bound>
where
    R: Router + Send + 'static,
{
    /// Run the server until Ctrl+C is received.
    ///
    /// ```compile_fail
    /// use ackwire::{config::ServerConfig, router::ServiceRouter, server::Server};
    ///
    /// async fn try_run() {
    ///     Server::new(ServerConfig::default(), ServiceRouter::new())
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with back-off and do not surface as
    /// errors; the result is reserved for future setup failures.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// On shutdown the listener stops accepting, every connection is closed
    /// with its timers cancelled and delivery state purged, and the call
    /// returns once all connection tasks have finished.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackwire::{config::ServerConfig, router::ServiceRouter, server::Server};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), ackwire::server::ServerError> {
    /// let server = Server::new(ServerConfig::default(), ServiceRouter::new())
    ///     .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let running = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    ///
    /// let _ = tx.send(());
    /// running
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            config,
            router,
            ready_tx,
            commands_rx,
            state: Bound { listener },
            ..
        } = self;

        let token = CancellationToken::new();
        let manager = ConnectionManager::new(config, router);
        manager.tracker().spawn(accept_loop(
            listener,
            manager.events(),
            AcceptLoopOptions {
                shutdown: token.clone(),
                backoff: config.accept_backoff,
            },
        ));
        tracing::info!(listen = %config.listen, "server listening");

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        let trigger = async {
            shutdown.await;
            tracing::info!("shutdown requested");
            token.cancel();
        };
        tokio::join!(manager.run(commands_rx, token.clone()), trigger);
        Ok(())
    }
}
