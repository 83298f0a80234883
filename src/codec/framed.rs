//! `tokio_util` adapter over the frame codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::{CodecError, MAX_FRAME_LENGTH, encode_into};
use crate::{
    frame::{Frame, HEADER_SIZE},
    reassembler::ParseState,
};

/// Stateful [`Decoder`]/[`Encoder`] for protocol frames.
///
/// Drives the same header/body state machine as
/// [`StreamReassembler`](crate::reassembler::StreamReassembler), so a parsed
/// header is not re-read while the body is still arriving.
///
/// # Examples
///
/// ```no_run
/// use ackwire::codec::FrameCodec;
/// use tokio::net::TcpStream;
/// use tokio_util::codec::Framed;
///
/// # async fn connect() -> std::io::Result<()> {
/// let stream = TcpStream::connect("127.0.0.1:8888").await?;
/// let framed = Framed::new(stream, FrameCodec::default());
/// # drop(framed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FrameCodec {
    max_frame_length: usize,
    state: ParseState,
}

impl FrameCodec {
    /// Construct a codec accepting frames up to `max_frame_length` bytes.
    ///
    /// The limit is clamped to `[HEADER_SIZE, MAX_FRAME_LENGTH]`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.clamp(HEADER_SIZE, MAX_FRAME_LENGTH),
            state: ParseState::default(),
        }
    }

    /// Maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let result = self.state.step(src, self.max_frame_length);
        if result.is_err() {
            self.state = ParseState::default();
        }
        result
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() && !self.state.is_awaiting_body() {
            return Ok(None);
        }
        let buffered = src.len() + if self.state.is_awaiting_body() { HEADER_SIZE } else { 0 };
        self.state = ParseState::default();
        Err(CodecError::UnexpectedEof { buffered })
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(&item, dst, self.max_frame_length)
    }
}
