//! Accept loop feeding new streams to the reactor.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::mpsc,
    time::{Duration, sleep},
};
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffConfig;
use crate::connection::ReactorEvent;

/// Source of incoming connections consumed by the accept loop.
///
/// Dropping a pending `accept()` future must not leak resources.
pub(in crate::server) trait AcceptListener: Send + Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl AcceptListener for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub shutdown: CancellationToken,
    pub backoff: BackoffConfig,
}

/// Accept connections from `listener` and hand each one to the reactor.
///
/// Accept failures are logged and retried after an exponential back-off.
/// The loop ends when `shutdown` is cancelled or the reactor stops
/// receiving events.
pub(in crate::server) async fn accept_loop<L>(
    listener: Arc<L>,
    events: mpsc::UnboundedSender<ReactorEvent>,
    options: AcceptLoopOptions,
) where
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions { shutdown, backoff } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) =
        accept_iteration(listener.as_ref(), &events, &shutdown, &backoff, delay).await
    {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<L: AcceptListener>(
    listener: &L,
    events: &mpsc::UnboundedSender<ReactorEvent>,
    shutdown: &CancellationToken,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration> {
    select! {
        biased;

        () = shutdown.cancelled() => None,
        res = listener.accept() => match res {
            Ok((stream, peer)) => {
                events.send(ReactorEvent::Accepted { stream, peer }).ok()?;
                Some(backoff.initial_delay)
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                select! {
                    biased;

                    () = shutdown.cancelled() => None,
                    () = sleep(delay) => Some(backoff.next_delay(delay)),
                }
            }
        },
    }
}
