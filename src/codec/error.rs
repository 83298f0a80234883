//! Error types for the codec layer.
//!
//! Needing more bytes is not an error: decoders report it through
//! [`Decoded::NeedMoreData`](super::Decoded::NeedMoreData). Everything here
//! is a hard failure that terminates the offending connection.
//!
//! # Error Categories
//!
//! - [`FramingError`]: the frame boundary or checksum is wrong.
//! - [`ProtocolError`]: the header or body violates the protocol rules.
//! - [`CodecError`]: top-level enum wrapping both plus serialization and I/O failures.

use std::io;

use thiserror::Error;

use crate::frame::HEADER_SIZE;

/// Wire-level problems with the frame boundary or integrity.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Declared length exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Declared or encoded frame size.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// Declared length is smaller than the header itself.
    #[error("frame length {length} is shorter than the {min}-byte header", min = HEADER_SIZE)]
    UndersizedFrame {
        /// Declared frame size.
        length: usize,
    },

    /// Recomputed checksum differs from the transmitted one.
    #[error("frame checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u16,
        /// Checksum carried in the header.
        actual: u16,
    },
}

/// Protocol rule violations found in an otherwise well-delimited frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Version byte is not one of the supported values.
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion {
        /// Version number that was rejected.
        version: u8,
    },

    /// Frame type byte is not a known discriminant.
    #[error("unknown frame type: {type_id}")]
    UnknownFrameType {
        /// Type byte that was not recognised.
        type_id: u8,
    },

    /// Body is not valid UTF-8 JSON.
    #[error("malformed body: {reason}")]
    MalformedBody {
        /// Parser diagnostic.
        reason: String,
    },

    /// Body parsed but is not a JSON object.
    #[error("body must be a JSON object")]
    BodyNotObject,

    /// Body has no entries.
    #[error("body must not be empty")]
    EmptyBody,

    /// A top-level key contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid character in body key {key:?}")]
    InvalidKey {
        /// Offending key.
        key: String,
    },

    /// A top-level string value is longer than allowed.
    #[error("value for {key:?} is {chars} characters, limit is {max}")]
    ValueTooLong {
        /// Key whose value is too long.
        key: String,
        /// Length of the value in characters.
        chars: usize,
        /// Maximum permitted length.
        max: usize,
    },
}

/// Top-level codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame boundary or checksum failure.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Header or body rule violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Body could not be serialized for sending.
    #[error("body serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stream ended part-way through a frame.
    #[error("stream closed with {buffered} bytes of an incomplete frame buffered")]
    UnexpectedEof {
        /// Bytes buffered when the stream closed.
        buffered: usize,
    },

    /// Transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns `true` if the peer sent bytes that break the protocol.
    ///
    /// Such errors close the connection; no partial recovery is attempted.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::Protocol(_))
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(inner) => inner,
            CodecError::UnexpectedEof { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::oversized(
        CodecError::from(FramingError::OversizedFrame { size: 11, max: 10 }),
        io::ErrorKind::InvalidData
    )]
    #[case::bad_version(
        CodecError::from(ProtocolError::UnsupportedVersion { version: 9 }),
        io::ErrorKind::InvalidData
    )]
    #[case::eof(CodecError::UnexpectedEof { buffered: 3 }, io::ErrorKind::UnexpectedEof)]
    fn converts_to_io_error_kind(#[case] err: CodecError, #[case] kind: io::ErrorKind) {
        assert_eq!(io::Error::from(err).kind(), kind);
    }

    #[test]
    fn only_peer_faults_are_protocol_violations() {
        assert!(CodecError::from(FramingError::UndersizedFrame { length: 3 }).is_protocol_violation());
        assert!(CodecError::from(ProtocolError::EmptyBody).is_protocol_violation());
        assert!(!CodecError::UnexpectedEof { buffered: 1 }.is_protocol_violation());
        assert!(!CodecError::from(io::Error::other("reset")).is_protocol_violation());
    }

    #[test]
    fn checksum_mismatch_formats_hex() {
        let err = FramingError::ChecksumMismatch {
            expected: 0x29B1,
            actual: 0x0001,
        };
        assert_eq!(
            err.to_string(),
            "frame checksum mismatch: expected 0x29b1, got 0x0001"
        );
    }
}
