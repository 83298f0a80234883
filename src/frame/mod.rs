//! Protocol frames.
//!
//! A [`Frame`] is the unit exchanged between peers: a [`FrameHeader`] worth
//! of routing metadata plus a JSON [`Body`]. Frames built in memory do not
//! carry a length or checksum; both are derived by the
//! [`codec`](crate::codec) when the frame is encoded.

mod body;
mod header;

use std::time::{SystemTime, UNIX_EPOCH};

pub use body::{Body, MAX_STRING_VALUE_CHARS};
pub use header::{
    CRC_OFFSET,
    FrameHeader,
    FrameType,
    HEADER_SIZE,
    PROTOCOL_VERSION,
    SUPPORTED_VERSIONS,
};

/// A complete protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version.
    pub version: u8,
    /// Service identifier used to route data frames.
    pub service_id: u16,
    /// Per-connection sequence number.
    pub sequence: u32,
    /// Frame type.
    pub frame_type: FrameType,
    /// Structured payload.
    pub body: Body,
}

impl Frame {
    /// Create a frame with the current protocol version and sequence `0`.
    #[must_use]
    pub fn new(frame_type: FrameType, service_id: u16, body: Body) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            service_id,
            sequence: 0,
            frame_type,
            body,
        }
    }

    /// Create a data frame for `service_id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackwire::frame::{Body, Frame, FrameType};
    ///
    /// let frame = Frame::data(2001, Body::new().with("page", 1)).with_sequence(7);
    /// assert_eq!(frame.frame_type, FrameType::Data);
    /// assert_eq!(frame.sequence, 7);
    /// ```
    #[must_use]
    pub fn data(service_id: u16, body: Body) -> Self { Self::new(FrameType::Data, service_id, body) }

    /// Create a heartbeat probe stamped with the current time.
    #[must_use]
    pub fn heartbeat() -> Self { Self::new(FrameType::Heartbeat, 0, timestamp_body()) }

    /// Build the acknowledgment for `received`, echoing its sequence.
    #[must_use]
    pub fn ack(received: &Frame) -> Self {
        Self {
            version: received.version,
            service_id: received.service_id,
            sequence: received.sequence,
            frame_type: FrameType::Ack,
            body: Body::new().with("ack", received.sequence),
        }
    }

    /// Build the reply to a heartbeat probe, echoing its sequence.
    #[must_use]
    pub fn heartbeat_ack(probe: &Frame) -> Self {
        Self {
            version: probe.version,
            service_id: probe.service_id,
            sequence: probe.sequence,
            frame_type: FrameType::HeartbeatAck,
            body: timestamp_body(),
        }
    }

    /// Build a data response to `request` carrying `body`.
    ///
    /// Version and service id are copied from the request. The sequence is
    /// left at zero; the send path stamps the connection's next sequence.
    #[must_use]
    pub fn response_to(request: &Frame, body: Body) -> Self {
        Self {
            version: request.version,
            service_id: request.service_id,
            sequence: 0,
            frame_type: FrameType::Data,
            body,
        }
    }

    /// Return the frame with `sequence` applied.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Return the frame with `version` applied.
    #[must_use]
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }
}

fn timestamp_body() -> Body {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    Body::new().with("timestamp", secs)
}
