//! Command line interface for the `ackwire` server binary.
//!
//! Also compiled into the build script to render the man page, so it must
//! not depend on the rest of the crate.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// Command line arguments for the `ackwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ackwire",
    version,
    about = "Acknowledged message server over length-prefixed TCP frames"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8888)]
    pub port: u16,
    /// Milliseconds between heartbeats sent to each client.
    #[arg(long, default_value_t = 3_000)]
    pub heartbeat_interval_ms: u64,
    /// Milliseconds of silence after which a client is disconnected.
    #[arg(long, default_value_t = 60_000)]
    pub heartbeat_timeout_ms: u64,
    /// Re-sends attempted before an unacknowledged frame is dropped.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,
    /// Milliseconds to wait for an acknowledgment before re-sending.
    #[arg(long, default_value_t = 2_000)]
    pub retransmit_interval_ms: u64,
    /// Worker threads for background tasks.
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,
    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Socket address assembled from `--host` and `--port`.
    #[must_use]
    pub fn listen(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_server_defaults() {
        let cli = Cli::parse_from(["ackwire"]);
        assert_eq!(cli.listen().to_string(), "0.0.0.0:8888");
        assert_eq!(cli.heartbeat_interval_ms, 3_000);
        assert_eq!(cli.heartbeat_timeout_ms, 60_000);
        assert_eq!(cli.max_retries, 3);
        assert_eq!(cli.retransmit_interval_ms, 2_000);
        assert_eq!(cli.workers, 4);
        assert!(cli.metrics_addr.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "ackwire",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--max-retries",
            "5",
            "--metrics-addr",
            "127.0.0.1:9100",
        ]);
        assert_eq!(cli.listen().to_string(), "127.0.0.1:9000");
        assert_eq!(cli.max_retries, 5);
        assert_eq!(
            cli.metrics_addr.map(|a| a.port()),
            Some(9100)
        );
    }
}
