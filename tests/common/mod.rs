//! Shared utilities for integration tests.
//!
//! Starts a real server on a loopback port and connects clients through the
//! crate's own [`FrameCodec`].

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    time::Duration,
};

use ackwire::{
    codec::FrameCodec,
    config::ServerConfig,
    frame::{Frame, FrameType},
    router::Router,
    server::{Server, ServerError, ServerHandle},
};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle, time::timeout};
use tokio_util::codec::Framed;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub type Client = Framed<TcpStream, FrameCodec>;

/// How long a test waits for an expected frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a TCP listener bound to a free local port.
#[expect(
    clippy::expect_used,
    reason = "binding to an ephemeral localhost port must abort the test immediately"
)]
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// Configuration with heartbeats slow enough not to interfere with a test.
pub fn quiet_config() -> ServerConfig {
    ServerConfig::default()
        .with_heartbeat_interval(Duration::from_secs(600))
        .with_heartbeat_timeout(Duration::from_secs(600))
}

/// A server running on a background task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    stop: oneshot::Sender<()>,
    join: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Bind to a free port and run until [`stop`](Self::stop).
    pub async fn start<R>(config: ServerConfig, router: R) -> TestResult<Self>
    where
        R: Router + Send + 'static,
    {
        let server = Server::new(config, router).bind_existing_listener(unused_listener())?;
        let addr = server.local_addr().ok_or("bound server has an address")?;
        let handle = server.handle();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(server.ready_signal(ready_tx).run_with_shutdown(async {
            let _ = stop_rx.await;
        }));
        ready_rx.await?;
        Ok(Self {
            addr,
            handle,
            stop,
            join,
        })
    }

    pub async fn connect(&self) -> TestResult<Client> {
        let stream = TcpStream::connect(self.addr).await?;
        Ok(Framed::new(stream, FrameCodec::default()))
    }

    /// Wait until `count` connections are established.
    pub async fn wait_for_connections(&self, count: usize) -> TestResult {
        timeout(RECV_TIMEOUT, async {
            loop {
                if self.handle.active_connections().await?.len() == count {
                    return Ok::<_, ServerError>(());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await??;
        Ok(())
    }

    pub async fn stop(self) -> TestResult {
        let _ = self.stop.send(());
        timeout(RECV_TIMEOUT, self.join).await???;
        Ok(())
    }
}

/// Receive the next frame, failing if none arrives in time.
pub async fn recv(client: &mut Client) -> TestResult<Frame> {
    let frame = timeout(RECV_TIMEOUT, client.next())
        .await?
        .ok_or("connection closed")??;
    Ok(frame)
}

/// Receive the next frame of `frame_type`, skipping any others.
pub async fn recv_type(client: &mut Client, frame_type: FrameType) -> TestResult<Frame> {
    loop {
        let frame = recv(client).await?;
        if frame.frame_type == frame_type {
            return Ok(frame);
        }
    }
}

/// Send `request`, expect its ack and return the response after acking it.
pub async fn call(client: &mut Client, request: Frame) -> TestResult<Frame> {
    let sequence = request.sequence;
    client.send(request).await?;
    let ack = recv(client).await?;
    if ack.frame_type != FrameType::Ack || ack.sequence != sequence {
        return Err(format!("expected ack for {sequence}, got {ack:?}").into());
    }
    let response = recv_type(client, FrameType::Data).await?;
    client.send(Frame::ack(&response)).await?;
    Ok(response)
}

/// Returns `true` if the server closes the connection within `wait`.
pub async fn closed_within(client: &mut Client, wait: Duration) -> bool {
    timeout(wait, async {
        loop {
            match client.next().await {
                None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .is_ok()
}
