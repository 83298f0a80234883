//! Incremental frame reassembly over a byte stream.
//!
//! TCP delivers bytes with arbitrary boundaries. [`StreamReassembler`] buffers
//! every chunk it is fed and runs a two-state machine over the buffer:
//!
//! - `AwaitingHeader`: wait for [`HEADER_SIZE`] bytes, validate the header,
//!   consume it and move to `AwaitingBody`.
//! - `AwaitingBody`: wait for the body, verify the checksum, parse it, queue
//!   the completed frame, consume the body and return to `AwaitingHeader`.
//!
//! The machine loops until it runs out of bytes, so several frames received
//! in a single read are all queued before [`feed`](StreamReassembler::feed)
//! returns. Bytes of a partially received frame stay in the buffer across
//! calls. Any decode failure discards the buffer and resets the machine; the
//! caller is expected to close the connection.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use crate::{
    codec::{CodecError, Decoded, MAX_FRAME_LENGTH, decode_body, decode_header},
    frame::{Frame, FrameHeader, HEADER_SIZE},
};

/// Position of the parser within the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ParseState {
    /// No header has been parsed for the current frame.
    #[default]
    AwaitingHeader,
    /// The header has been consumed; waiting for its body.
    AwaitingBody(FrameHeader),
}

impl ParseState {
    /// Advance over `buf` until one frame completes or more bytes are needed.
    ///
    /// Consumed bytes are removed from the front of `buf`. On error the
    /// caller must reset the state; `buf` is left as it was when the failing
    /// step started.
    pub(crate) fn step(
        &mut self,
        buf: &mut BytesMut,
        max_frame_length: usize,
    ) -> Result<Option<Frame>, CodecError> {
        loop {
            match *self {
                Self::AwaitingHeader => match decode_header(&buf[..], max_frame_length)? {
                    Decoded::Complete(header) => {
                        buf.advance(HEADER_SIZE);
                        *self = Self::AwaitingBody(header);
                    }
                    Decoded::NeedMoreData { .. } => return Ok(None),
                },
                Self::AwaitingBody(header) => match decode_body(&buf[..], &header)? {
                    Decoded::Complete(frame) => {
                        buf.advance(header.body_len());
                        *self = Self::AwaitingHeader;
                        return Ok(Some(frame));
                    }
                    Decoded::NeedMoreData { .. } => return Ok(None),
                },
            }
        }
    }

    pub(crate) fn is_awaiting_body(&self) -> bool { matches!(self, Self::AwaitingBody(_)) }
}

/// Turns arbitrarily sized reads into a queue of complete frames.
///
/// # Examples
///
/// ```
/// use ackwire::{
///     codec::encode,
///     frame::{Body, Frame},
///     reassembler::StreamReassembler,
/// };
///
/// let frame = Frame::data(2001, Body::new().with("page", 1));
/// let bytes = encode(&frame).expect("encode");
///
/// let mut reassembler = StreamReassembler::default();
/// assert_eq!(reassembler.feed(&bytes[..5]).expect("feed"), 0);
/// assert_eq!(reassembler.feed(&bytes[5..]).expect("feed"), 1);
/// assert_eq!(reassembler.pop_frame(), Some(frame));
/// ```
#[derive(Debug)]
pub struct StreamReassembler {
    buffer: BytesMut,
    state: ParseState,
    ready: VecDeque<Frame>,
    max_frame_length: usize,
}

impl StreamReassembler {
    /// Create a reassembler that rejects frames longer than
    /// `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            state: ParseState::default(),
            ready: VecDeque::new(),
            max_frame_length,
        }
    }

    /// Append `chunk` and queue every frame it completes.
    ///
    /// Returns the number of frames completed by this call. Frames completed
    /// before a failure remain queued.
    ///
    /// # Errors
    ///
    /// Returns the [`CodecError`] raised by the header or body decoder. The
    /// buffered bytes are discarded and the state machine is reset.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<usize, CodecError> {
        self.buffer.extend_from_slice(chunk);
        let mut completed = 0;
        loop {
            match self.state.step(&mut self.buffer, self.max_frame_length) {
                Ok(Some(frame)) => {
                    self.ready.push_back(frame);
                    completed += 1;
                }
                Ok(None) => return Ok(completed),
                Err(err) => {
                    self.buffer.clear();
                    self.state = ParseState::AwaitingHeader;
                    return Err(err);
                }
            }
        }
    }

    /// Take the oldest completed frame.
    pub fn pop_frame(&mut self) -> Option<Frame> { self.ready.pop_front() }

    /// Take every completed frame in arrival order.
    pub fn drain_frames(&mut self) -> impl Iterator<Item = Frame> + '_ { self.ready.drain(..) }

    /// Number of completed frames waiting to be taken.
    #[must_use]
    pub fn ready_len(&self) -> usize { self.ready.len() }

    /// Bytes buffered for the frame currently being assembled.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buffer.len() }

    /// Returns `true` once a header has been accepted and its body is pending.
    #[must_use]
    pub fn is_awaiting_body(&self) -> bool { self.state.is_awaiting_body() }

    /// Discard buffered bytes, queued frames and parser state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready.clear();
        self.state = ParseState::AwaitingHeader;
    }
}

impl Default for StreamReassembler {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec, prelude::any, prop_assert, prop_assert_eq, proptest};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        codec::{FramingError, ProtocolError, encode},
        frame::{Body, FrameType},
    };

    #[fixture]
    fn reassembler() -> StreamReassembler { StreamReassembler::default() }

    fn frame(sequence: u32) -> Frame {
        Frame::data(2001, Body::new().with("page", sequence)).with_sequence(sequence)
    }

    fn wire(frames: &[Frame]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|f| encode(f).expect("encode should succeed").to_vec())
            .collect()
    }

    #[rstest]
    fn drains_multiple_frames_from_one_read(mut reassembler: StreamReassembler) {
        let frames = [frame(1), frame(2), frame(3)];
        assert_eq!(reassembler.feed(&wire(&frames)).expect("feed"), 3);
        assert_eq!(reassembler.drain_frames().collect::<Vec<_>>(), frames);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[rstest]
    fn keeps_partial_trailing_frame(mut reassembler: StreamReassembler) {
        let bytes = wire(&[frame(1), frame(2)]);
        let split = bytes.len() - 4;

        assert_eq!(reassembler.feed(&bytes[..split]).expect("feed"), 1);
        assert!(reassembler.is_awaiting_body());
        assert_eq!(reassembler.pop_frame(), Some(frame(1)));
        assert_eq!(reassembler.pop_frame(), None);

        assert_eq!(reassembler.feed(&bytes[split..]).expect("feed"), 1);
        assert_eq!(reassembler.pop_frame(), Some(frame(2)));
        assert!(!reassembler.is_awaiting_body());
    }

    #[rstest]
    fn header_is_consumed_before_body_arrives(mut reassembler: StreamReassembler) {
        let bytes = wire(&[frame(9)]);
        reassembler
            .feed(&bytes[..HEADER_SIZE + 1])
            .expect("feed");
        assert!(reassembler.is_awaiting_body());
        assert_eq!(reassembler.buffered_len(), 1);
    }

    #[rstest]
    fn feed_of_empty_chunk_is_a_no_op(mut reassembler: StreamReassembler) {
        assert_eq!(reassembler.feed(&[]).expect("feed"), 0);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[rstest]
    fn bad_version_discards_buffer(mut reassembler: StreamReassembler) {
        let mut bytes = wire(&[frame(1)]);
        bytes[0] = 7;
        let err = reassembler.feed(&bytes).expect_err("version 7 is unsupported");
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnsupportedVersion { version: 7 })
        ));
        assert_eq!(reassembler.buffered_len(), 0);
        assert!(!reassembler.is_awaiting_body());
    }

    #[rstest]
    fn checksum_failure_keeps_earlier_frames(mut reassembler: StreamReassembler) {
        let mut bytes = wire(&[frame(1), frame(2)]);
        let last = bytes.len() - 2;
        bytes[last] ^= 0x40;

        let err = reassembler.feed(&bytes).expect_err("second frame is corrupt");
        assert!(matches!(
            err,
            CodecError::Framing(FramingError::ChecksumMismatch { .. })
        ));
        assert_eq!(reassembler.pop_frame(), Some(frame(1)));
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[rstest]
    fn oversized_declared_length_is_rejected_before_body(#[values(64, 128)] max: usize) {
        let mut reassembler = StreamReassembler::new(max);
        let big = Frame::new(FrameType::Data, 1, Body::new().with("blob", "x".repeat(max)));
        let bytes = encode(&big).expect("encode should succeed");

        let err = reassembler
            .feed(&bytes[..HEADER_SIZE])
            .expect_err("declared length exceeds limit");
        assert!(matches!(
            err,
            CodecError::Framing(FramingError::OversizedFrame { .. })
        ));
    }

    #[rstest]
    fn reset_clears_everything(mut reassembler: StreamReassembler) {
        let bytes = wire(&[frame(1), frame(2)]);
        reassembler.feed(&bytes[..bytes.len() - 1]).expect("feed");
        reassembler.reset();
        assert_eq!(reassembler.ready_len(), 0);
        assert_eq!(reassembler.buffered_len(), 0);
        assert!(!reassembler.is_awaiting_body());
    }

    proptest! {
        #[test]
        fn reassembles_across_arbitrary_splits(
            sequence in any::<u32>(),
            cuts in vec(any::<proptest::sample::Index>(), 0..12),
        ) {
            let expected = frame(sequence);
            let bytes = wire(std::slice::from_ref(&expected));

            let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len())).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut reassembler = StreamReassembler::default();
            let mut completed = 0;
            for window in points.windows(2) {
                completed += reassembler.feed(&bytes[window[0]..window[1]]).expect("feed");
            }

            prop_assert_eq!(completed, 1);
            prop_assert_eq!(reassembler.pop_frame(), Some(expected));
            prop_assert!(reassembler.pop_frame().is_none());
            prop_assert_eq!(reassembler.buffered_len(), 0);
        }

        #[test]
        fn byte_at_a_time_feed_preserves_order(count in 1usize..6) {
            let frames: Vec<Frame> = (0..count).map(|i| frame(u32::try_from(i).expect("small"))).collect();
            let bytes = wire(&frames);

            let mut reassembler = StreamReassembler::default();
            for byte in &bytes {
                reassembler.feed(std::slice::from_ref(byte)).expect("feed");
            }
            prop_assert_eq!(reassembler.drain_frames().collect::<Vec<_>>(), frames);
        }
    }
}
