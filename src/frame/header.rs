//! Fixed-size frame header and frame type discriminants.
//!
//! Every frame starts with a 14-byte header. Multi-byte fields are carried in
//! network byte order:
//!
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 1    | version        |
//! | 1      | 2    | service id     |
//! | 3      | 4    | total length   |
//! | 7      | 2    | CRC-16         |
//! | 9      | 4    | sequence       |
//! | 13     | 1    | frame type     |

use bytes::{Buf, BufMut};

use crate::codec::ProtocolError;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 14;

/// Byte offset of the CRC field inside the header.
pub const CRC_OFFSET: usize = 7;

/// Protocol version stamped on frames created by this crate.
pub const PROTOCOL_VERSION: u8 = 1;

/// Versions accepted by the decoder.
pub const SUPPORTED_VERSIONS: [u8; 2] = [0, 1];

/// Kind of frame carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Application payload routed to the service handlers.
    Data = 0,
    /// Acknowledges a received frame by echoing its sequence.
    Ack = 1,
    /// Liveness probe.
    Heartbeat = 2,
    /// Reply to a liveness probe.
    HeartbeatAck = 3,
}

impl FrameType {
    /// Wire representation of this frame type.
    #[must_use]
    pub const fn as_u8(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Data),
            1 => Ok(Self::Ack),
            2 => Ok(Self::Heartbeat),
            3 => Ok(Self::HeartbeatAck),
            other => Err(ProtocolError::UnknownFrameType { type_id: other }),
        }
    }
}

/// Parsed header of a frame as it appeared on the wire.
///
/// Unlike [`Frame`](super::Frame), the header records the declared total
/// length and the transmitted checksum so the body can be validated against
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version.
    pub version: u8,
    /// Service identifier used for routing data frames.
    pub service_id: u16,
    /// Total frame length, header included.
    pub length: u32,
    /// CRC-16 transmitted with the frame.
    pub crc: u16,
    /// Per-connection sequence number.
    pub sequence: u32,
    /// Frame type.
    pub frame_type: FrameType,
}

impl FrameHeader {
    /// Number of body bytes that follow the header.
    #[must_use]
    pub fn body_len(&self) -> usize { (self.length as usize).saturating_sub(HEADER_SIZE) }

    /// Total frame length as a `usize`.
    #[must_use]
    pub fn frame_len(&self) -> usize { self.length as usize }

    /// Read the raw header fields from `src`.
    ///
    /// Only the frame type is interpreted here; version and length limits
    /// are enforced by [`decode_header`](crate::codec::decode_header).
    pub(crate) fn read_from(mut src: &[u8]) -> Result<Self, ProtocolError> {
        let version = src.get_u8();
        let service_id = src.get_u16();
        let length = src.get_u32();
        let crc = src.get_u16();
        let sequence = src.get_u32();
        let frame_type = FrameType::try_from(src.get_u8())?;
        Ok(Self {
            version,
            service_id,
            length,
            crc,
            sequence,
            frame_type,
        })
    }

    /// Write the header to `dst`, substituting `crc` for the checksum field.
    pub(crate) fn write_to<B: BufMut>(&self, dst: &mut B, crc: u16) {
        dst.put_u8(self.version);
        dst.put_u16(self.service_id);
        dst.put_u32(self.length);
        dst.put_u16(crc);
        dst.put_u32(self.sequence);
        dst.put_u8(self.frame_type.as_u8());
    }

    /// Header bytes with the CRC field zeroed, as covered by the checksum.
    pub(crate) fn checksum_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0_u8; HEADER_SIZE];
        let mut cursor = &mut out[..];
        self.write_to(&mut cursor, 0);
        out
    }
}
