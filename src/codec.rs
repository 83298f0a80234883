//! Wire codec for protocol frames.
//!
//! Encoding and decoding are pure functions over byte slices. A frame is a
//! 14-byte [`FrameHeader`] followed by a UTF-8 JSON body; the header carries
//! the total frame length and a CRC-16/CCITT-FALSE checksum computed over the
//! header (checksum field zeroed) followed by the body.
//!
//! Running out of input is not an error. [`decode_header`] and
//! [`decode_body`] return [`Decoded::NeedMoreData`] so the caller can wait for
//! the next read; anything else that goes wrong is a [`CodecError`].
//!
//! [`FrameCodec`] adapts these functions to `tokio_util`'s
//! [`Decoder`](tokio_util::codec::Decoder) and
//! [`Encoder`](tokio_util::codec::Encoder) traits for use with `Framed`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{Body, CRC_OFFSET, Frame, FrameHeader, HEADER_SIZE, SUPPORTED_VERSIONS};

pub mod crc;
pub mod error;
mod framed;

pub use crc::{Crc16, crc16};
pub use error::{CodecError, FramingError, ProtocolError};
pub use framed::FrameCodec;

/// Largest frame accepted by default (10 MiB, header included).
pub const MAX_FRAME_LENGTH: usize = 10 * 1024 * 1024;

/// Outcome of a decode step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A complete value was decoded.
    Complete(T),
    /// More bytes are required before decoding can make progress.
    NeedMoreData {
        /// Bytes currently available.
        have: usize,
        /// Bytes required for the next step.
        need: usize,
    },
}

impl<T> Decoded<T> {
    /// Returns the decoded value, discarding the shortfall details.
    #[must_use]
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::NeedMoreData { .. } => None,
        }
    }
}

/// Encode `frame` into a freshly allocated buffer.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the body cannot be serialized and
/// [`FramingError::OversizedFrame`] if the encoded frame would exceed
/// [`MAX_FRAME_LENGTH`].
///
/// # Examples
///
/// ```
/// use ackwire::{
///     codec::{Decoded, MAX_FRAME_LENGTH, decode, encode},
///     frame::{Body, Frame},
/// };
///
/// let frame = Frame::data(2001, Body::new().with("page", 1)).with_sequence(7);
/// let bytes = encode(&frame).expect("encode");
/// assert_eq!(bytes.len(), 14 + br#"{"page":1}"#.len());
///
/// let Decoded::Complete((decoded, used)) = decode(&bytes, MAX_FRAME_LENGTH).expect("decode") else {
///     panic!("frame should be complete");
/// };
/// assert_eq!(decoded, frame);
/// assert_eq!(used, bytes.len());
/// ```
pub fn encode(frame: &Frame) -> Result<Bytes, CodecError> {
    let mut dst = BytesMut::new();
    encode_into(frame, &mut dst, MAX_FRAME_LENGTH)?;
    Ok(dst.freeze())
}

/// Append the encoding of `frame` to `dst`, rejecting frames longer than `max`.
///
/// `dst` is left untouched when an error is returned.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_into(frame: &Frame, dst: &mut BytesMut, max: usize) -> Result<(), CodecError> {
    let body = frame.body.to_vec()?;
    let size = HEADER_SIZE + body.len();
    let length = u32::try_from(size)
        .ok()
        .filter(|_| size <= max)
        .ok_or(FramingError::OversizedFrame { size, max })?;

    let header = FrameHeader {
        version: frame.version,
        service_id: frame.service_id,
        length,
        crc: 0,
        sequence: frame.sequence,
        frame_type: frame.frame_type,
    };

    let start = dst.len();
    dst.reserve(size);
    header.write_to(dst, 0);
    dst.put_slice(&body);

    let crc = crc16(&dst[start..]);
    dst[start + CRC_OFFSET..start + CRC_OFFSET + 2].copy_from_slice(&crc.to_be_bytes());
    Ok(())
}

/// Decode a frame header from the start of `src`.
///
/// Validates the version byte, the frame type and that the declared length
/// lies within `[HEADER_SIZE, max]`.
///
/// # Errors
///
/// Returns a [`CodecError`] if the header is invalid.
pub fn decode_header(src: &[u8], max: usize) -> Result<Decoded<FrameHeader>, CodecError> {
    let Some(raw) = src.get(..HEADER_SIZE) else {
        return Ok(Decoded::NeedMoreData {
            have: src.len(),
            need: HEADER_SIZE,
        });
    };

    let version = raw[0];
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ProtocolError::UnsupportedVersion { version }.into());
    }

    let header = FrameHeader::read_from(raw)?;
    let length = header.frame_len();
    if length < HEADER_SIZE {
        return Err(FramingError::UndersizedFrame { length }.into());
    }
    if length > max {
        return Err(FramingError::OversizedFrame { size: length, max }.into());
    }
    Ok(Decoded::Complete(header))
}

/// Decode the body that follows `header`.
///
/// `src` must start immediately after the header bytes. The checksum is
/// verified before the body is parsed so a corrupted frame is never
/// interpreted.
///
/// # Errors
///
/// Returns [`FramingError::ChecksumMismatch`] if the checksum does not match
/// and a [`ProtocolError`] if the body fails to parse or validate.
pub fn decode_body(src: &[u8], header: &FrameHeader) -> Result<Decoded<Frame>, CodecError> {
    let need = header.body_len();
    let Some(raw) = src.get(..need) else {
        return Ok(Decoded::NeedMoreData {
            have: src.len(),
            need,
        });
    };

    let mut crc = Crc16::new();
    crc.update(&header.checksum_bytes());
    crc.update(raw);
    let expected = crc.finish();
    if expected != header.crc {
        return Err(FramingError::ChecksumMismatch {
            expected,
            actual: header.crc,
        }
        .into());
    }

    let body = Body::parse(raw)?;
    Ok(Decoded::Complete(Frame {
        version: header.version,
        service_id: header.service_id,
        sequence: header.sequence,
        frame_type: header.frame_type,
        body,
    }))
}

/// Decode one complete frame from the start of `src`.
///
/// On success returns the frame with the number of bytes it occupied.
///
/// # Errors
///
/// See [`decode_header`] and [`decode_body`].
pub fn decode(src: &[u8], max: usize) -> Result<Decoded<(Frame, usize)>, CodecError> {
    let header = match decode_header(src, max)? {
        Decoded::Complete(header) => header,
        Decoded::NeedMoreData { have, need } => return Ok(Decoded::NeedMoreData { have, need }),
    };
    match decode_body(&src[HEADER_SIZE..], &header)? {
        Decoded::Complete(frame) => Ok(Decoded::Complete((frame, header.frame_len()))),
        Decoded::NeedMoreData { have, need } => Ok(Decoded::NeedMoreData {
            have: HEADER_SIZE + have,
            need: HEADER_SIZE + need,
        }),
    }
}
