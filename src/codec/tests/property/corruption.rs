//! Generated checks that corrupted frames are never accepted.

use proptest::{
    prelude::{Strategy, any},
    prop_assert,
    test_runner::TestCaseError,
};

use super::shared::{deterministic_runner, frame_strategy};
use crate::{
    codec::{CodecError, FramingError, MAX_FRAME_LENGTH, decode, encode},
    frame::{CRC_OFFSET, HEADER_SIZE},
};

#[test]
fn single_bit_flip_in_body_is_detected() {
    let mut runner = deterministic_runner(256);
    let strategy = (frame_strategy(), any::<usize>(), 0u8..8);
    runner
        .run(&strategy, |(frame, position, bit)| {
            let mut bytes = encode(&frame)
                .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?
                .to_vec();
            let body_len = bytes.len() - HEADER_SIZE;
            let index = HEADER_SIZE + position % body_len;
            bytes[index] ^= 1 << bit;

            let result = decode(&bytes, MAX_FRAME_LENGTH);
            prop_assert!(
                matches!(
                    result,
                    Err(CodecError::Framing(FramingError::ChecksumMismatch { .. }))
                ),
                "corruption not detected: {result:?}"
            );
            Ok(())
        })
        .expect("body corruption should always be detected");
}

#[test]
fn corrupted_crc_field_is_always_rejected() {
    let mut runner = deterministic_runner(128);
    let strategy = (frame_strategy(), (1u16..=u16::MAX).prop_map(u16::to_be_bytes));
    runner
        .run(&strategy, |(frame, mask)| {
            let mut bytes = encode(&frame)
                .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?
                .to_vec();
            bytes[CRC_OFFSET] ^= mask[0];
            bytes[CRC_OFFSET + 1] ^= mask[1];

            let result = decode(&bytes, MAX_FRAME_LENGTH);
            prop_assert!(
                matches!(
                    result,
                    Err(CodecError::Framing(FramingError::ChecksumMismatch { .. }))
                ),
                "bad checksum accepted: {result:?}"
            );
            Ok(())
        })
        .expect("corrupted checksums should be rejected");
}
