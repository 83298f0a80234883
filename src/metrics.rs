//! Metric helpers for `ackwire`.
//!
//! This module defines metric names and thin helpers over the
//! [`metrics`](https://docs.rs/metrics) facade. When the `metrics` feature is
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking established connections.
pub const CONNECTIONS_ACTIVE: &str = "ackwire_connections_active";
/// Name of the counter tracking frames sent and received.
pub const FRAMES_TOTAL: &str = "ackwire_frames_total";
/// Name of the counter tracking retransmitted frames.
pub const RETRANSMITS_TOTAL: &str = "ackwire_retransmits_total";
/// Name of the counter tracking frames dropped after exhausting retries.
pub const DELIVERIES_ABANDONED_TOTAL: &str = "ackwire_deliveries_abandoned_total";
/// Name of the counter tracking connections closed for protocol violations.
pub const PROTOCOL_ERRORS_TOTAL: &str = "ackwire_protocol_errors_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received from a peer.
    Inbound,
    /// Frames written to a peer.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a retransmission.
pub fn inc_retransmits() {
    #[cfg(feature = "metrics")]
    counter!(RETRANSMITS_TOTAL).increment(1);
}

/// Record a delivery abandoned after its final retry.
pub fn inc_abandoned() {
    #[cfg(feature = "metrics")]
    counter!(DELIVERIES_ABANDONED_TOTAL).increment(1);
}

/// Record a connection closed because the peer broke the protocol.
pub fn inc_protocol_errors() {
    #[cfg(feature = "metrics")]
    counter!(PROTOCOL_ERRORS_TOTAL).increment(1);
}
