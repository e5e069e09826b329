//! # BU Wire Protocol Module
//!
//! Binary command/response protocol spoken by the antenna control units.
//!
//! This module handles:
//! - CRC-16 (poly 0x1021, seed 0x1D0F) checksum calculation
//! - Frame encoding/decoding with bus preambles and rolling command ids
//! - Per-unit element enable bitmask
//! - Payload encoders for every unit operation
//! - Fixed-layout telemetry decoding

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
pub mod state;
pub mod commands;
pub mod telemetry;
