//! # AFAR Bench Library
//!
//! Drive the control units of a phased-array antenna test bench.
//!
//! This library implements the units' binary command/response protocol:
//! CRC-16 framing with bus preambles, per-unit element enable bitmasks,
//! command encoders, the point-to-point acknowledgment cycle and telemetry
//! decoding, over serial or UDP links.

pub mod config;
pub mod driver;
pub mod error;
pub mod telemetry;
pub mod transport;
pub mod wire;
