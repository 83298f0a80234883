//! Property-oriented tests for codec round-tripping and corruption detection.

mod corruption;
mod round_trip;
pub(crate) mod shared;
