//! Acknowledged message framing over TCP.
//!
//! `ackwire` exchanges length-prefixed, CRC-checked frames carrying JSON
//! bodies. The crate is layered bottom-up:
//!
//! - [`frame`] and [`codec`]: the 14-byte header, the body model and
//!   encoding/decoding with CRC-16/CCITT-FALSE.
//! - [`reassembler`]: turns arbitrary TCP reads into complete frames.
//! - [`delivery`]: per-connection sequencing, acknowledgment tracking and
//!   timed retransmission.
//! - [`connection`]: the single-task reactor owning all connection state,
//!   heartbeats included.
//! - [`task`]: a worker pool for long-running work with pollable status.
//! - [`router`], [`services`] and [`server`]: the pieces an application wires
//!   together at startup.

pub mod codec;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod frame;
pub mod metrics;
pub mod panic;
pub mod reassembler;
pub mod router;
pub mod server;
pub mod services;
pub mod task;

pub use codec::{CodecError, FrameCodec};
pub use config::ServerConfig;
pub use connection::ConnectionId;
pub use frame::{Body, Frame, FrameType};
pub use router::{Router, ServiceRouter};
pub use server::{Server, ServerError, ServerHandle};
pub use task::{TaskHandle, TaskId, TaskManager, TaskOutcome, TaskStatus};
