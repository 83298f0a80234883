//! Generated round-trip checks for the codec and its `tokio_util` adapter.

use bytes::BytesMut;
use proptest::{prop_assert, prop_assert_eq, test_runner::TestCaseError};
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::shared::{deterministic_runner, frame_sequence_strategy, frame_strategy};
use crate::codec::{Decoded, FrameCodec, MAX_FRAME_LENGTH, decode, encode};

#[test]
fn generated_frames_round_trip() {
    let mut runner = deterministic_runner(256);
    runner
        .run(&frame_strategy(), |frame| {
            let bytes =
                encode(&frame).map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
            let decoded = decode(&bytes, MAX_FRAME_LENGTH)
                .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?;
            let Decoded::Complete((decoded, used)) = decoded else {
                return Err(TestCaseError::fail("frame should be complete".to_owned()));
            };
            prop_assert_eq!(used, bytes.len());
            prop_assert_eq!(decoded, frame);
            Ok(())
        })
        .expect("generated frames should round-trip");
}

#[rstest]
#[case(1..4, 64)]
#[case(4..16, 32)]
fn generated_frame_sequences_round_trip_through_framed_codec(
    #[case] lengths: std::ops::Range<usize>,
    #[case] cases: u32,
) {
    let mut runner = deterministic_runner(cases);
    runner
        .run(&frame_sequence_strategy(lengths), |frames| {
            let mut codec = FrameCodec::default();
            let mut wire = BytesMut::new();
            for frame in &frames {
                codec
                    .encode(frame.clone(), &mut wire)
                    .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
            }

            for expected in &frames {
                let frame = codec
                    .decode(&mut wire)
                    .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?
                    .ok_or_else(|| TestCaseError::fail("missing frame during decode".to_owned()))?;
                prop_assert_eq!(&frame, expected);
            }

            prop_assert!(wire.is_empty());
            Ok(())
        })
        .expect("generated frame sequences should round-trip");
}
