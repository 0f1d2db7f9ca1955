//! alphacast-core: Shared types for alphacast
//!
//! This crate provides the frame model, the binary wire codec, the throughput
//! monitor and the upstream source trait used by the alphacast WebSocket
//! video server.

pub mod codec;
pub mod frame;
pub mod rate;
pub mod source;

pub use codec::{
    CodecError, DEFAULT_QUALITY, FrameCodec, HEADER_SIZE, Payload, PayloadEncoder, PayloadHeader,
};
pub use frame::Frame;
pub use rate::{RateMonitor, RateReport, REPORT_INTERVAL};
pub use source::{MatteSource, TestPattern};
