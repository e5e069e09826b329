//! # Error Types
//!
//! Custom error types for AFAR Bench using `thiserror`.
//!
//! Every component surfaces its failures to the immediate caller. Only the
//! acknowledgment cycle retries, and only a bounded number of times.

use thiserror::Error;

use crate::driver::ack::NackReason;

/// Main error type for AFAR Bench
#[derive(Debug, Error)]
pub enum AfarError {
    /// Physical link errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed frames
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Unit kept rejecting a command after every allowed attempt
    #[error("Command 0x{code:02X} not delivered to BU#{unit} after {attempts} attempts (last: {last})")]
    NotDelivered {
        unit: u8,
        code: u8,
        attempts: u8,
        last: NackReason,
    },

    /// Telemetry payload errors
    #[error("Telemetry decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Discovery found nobody
    #[error("No control unit answered on addresses {first}..={last}")]
    AddressNotFound { first: u8, last: u8 },

    /// Caller passed a value outside the protocol range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Link-level failures. Never retried by the protocol layer.
///
/// A read that sees nothing before its timeout is not an error: it returns
/// an empty reply, which the protocol layer treats as silence.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link is not open")]
    LinkNotOpen,

    #[error("failed to open {0}")]
    Open(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("no serial device found (tried: {0})")]
    PortNotFound(String),
}

/// Frame Codec failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    #[error("CRC mismatch: computed 0x{expected:04X}, received 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("invalid separator byte 0x{0:02X}")]
    BadSeparator(u8),

    #[error("preamble does not match BU#{address}")]
    PreambleMismatch { address: u8 },

    #[error("address {0} is outside the bus range")]
    InvalidAddress(u8),

    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    #[error("unexpected reply from BU#{address} with code 0x{code:02X}")]
    UnexpectedReply { address: u8, code: u8 },
}

/// Telemetry Decoder failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("telemetry body too short: {len} bytes, need {min}")]
    TooShort { len: usize, min: usize },
}

impl AfarError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AfarError::InvalidArgument(msg.into())
    }
}

/// Result type alias for AFAR Bench
pub type Result<T> = std::result::Result<T, AfarError>;
