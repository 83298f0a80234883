//! Shared proptest helpers for codec property tests.

use std::ops::Range;

use proptest::{
    collection::{btree_map, vec},
    prelude::{Just, Strategy, any, prop_oneof},
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner},
};
use serde_json::Value;

use crate::frame::{Body, Frame, FrameType};

pub fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,48}".prop_map(Value::from),
        "\\PC{0,16}".prop_map(Value::from),
    ]
}

pub fn body_strategy() -> impl Strategy<Value = Body> {
    btree_map("[A-Za-z0-9_]{1,12}", value_strategy(), 1..6)
        .prop_map(|entries| Body::from(entries.into_iter().collect::<serde_json::Map<_, _>>()))
}

fn frame_type_strategy() -> impl Strategy<Value = FrameType> {
    prop_oneof![
        Just(FrameType::Data),
        Just(FrameType::Ack),
        Just(FrameType::Heartbeat),
        Just(FrameType::HeartbeatAck),
    ]
}

pub fn frame_strategy() -> impl Strategy<Value = Frame> {
    (
        0u8..=1,
        any::<u16>(),
        any::<u32>(),
        frame_type_strategy(),
        body_strategy(),
    )
        .prop_map(|(version, service_id, sequence, frame_type, body)| Frame {
            version,
            service_id,
            sequence,
            frame_type,
            body,
        })
}

pub fn frame_sequence_strategy(lengths: Range<usize>) -> impl Strategy<Value = Vec<Frame>> {
    vec(frame_strategy(), lengths)
}
