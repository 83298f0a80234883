//! Server configuration.
//!
//! [`ServerConfig`] is a plain value supplied at startup. The library never
//! reads files or the environment; the `ackwire` binary builds one from its
//! command line.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use crate::{
    codec::MAX_FRAME_LENGTH,
    delivery::DeliveryConfig,
    frame::HEADER_SIZE,
    server::BackoffConfig,
};

/// Port the server listens on by default.
pub const DEFAULT_PORT: u16 = 8888;

const MIN_DURATION: Duration = Duration::from_millis(1);

/// Settings for the server, its connections and its task pool.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ackwire::config::ServerConfig;
///
/// let config = ServerConfig::default()
///     .with_port(9000)
///     .with_heartbeat_timeout(Duration::from_secs(30))
///     .with_workers(8);
/// assert_eq!(config.listen.port(), 9000);
/// assert_eq!(config.delivery().max_retries, 3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub listen: SocketAddr,
    /// Interval between heartbeats sent to each peer.
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is considered dead.
    pub heartbeat_timeout: Duration,
    /// Re-sends attempted before an unacknowledged frame is dropped.
    pub max_retries: u32,
    /// Age after which an unacknowledged frame is re-sent.
    pub retransmit_interval: Duration,
    /// Worker threads in the task pool.
    pub workers: usize,
    /// Largest frame accepted from or sent to a peer.
    pub max_frame_length: usize,
    /// Back-off applied when `accept()` fails.
    pub accept_backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            heartbeat_interval: Duration::from_secs(3),
            heartbeat_timeout: Duration::from_secs(60),
            max_retries: 3,
            retransmit_interval: Duration::from_secs(2),
            workers: 4,
            max_frame_length: MAX_FRAME_LENGTH,
            accept_backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set the listen address.
    #[must_use]
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Set only the listen port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen.set_port(port);
        self
    }

    /// Set the outbound heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat timeout.
    #[must_use]
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the retransmission budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retransmission interval.
    #[must_use]
    pub fn with_retransmit_interval(mut self, interval: Duration) -> Self {
        self.retransmit_interval = interval;
        self
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the maximum frame length.
    #[must_use]
    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Set the accept back-off policy.
    #[must_use]
    pub fn with_accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.accept_backoff = backoff;
        self
    }

    /// Retransmission policy derived from this configuration.
    #[must_use]
    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            max_retries: self.max_retries,
            retransmit_interval: self.retransmit_interval,
        }
    }

    /// Clamp every field to a usable value.
    ///
    /// Durations become at least 1 ms, the pool gets at least one worker and
    /// the frame limit is kept within `[HEADER_SIZE, MAX_FRAME_LENGTH]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use ackwire::config::ServerConfig;
    ///
    /// let config = ServerConfig::default()
    ///     .with_workers(0)
    ///     .with_retransmit_interval(Duration::ZERO)
    ///     .normalized();
    /// assert_eq!(config.workers, 1);
    /// assert_eq!(config.retransmit_interval, Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.heartbeat_interval = self.heartbeat_interval.max(MIN_DURATION);
        self.heartbeat_timeout = self.heartbeat_timeout.max(MIN_DURATION);
        self.retransmit_interval = self.retransmit_interval.max(MIN_DURATION);
        self.workers = self.workers.max(1);
        self.max_frame_length = self.max_frame_length.clamp(HEADER_SIZE, MAX_FRAME_LENGTH);
        self.accept_backoff = self.accept_backoff.normalized();
        self
    }
}
