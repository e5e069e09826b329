//! # Acknowledgment Cycle
//!
//! Point-to-point units confirm nothing on their own. After every command
//! the driver writes a status probe and reads the unit's verdict:
//!
//! ```text
//! Idle -> Sending -> AwaitingAck -> Acked
//!                                -> NackRetryable -> Sending (resend)
//!                                -> NackFatal     -> Idle (error surfaced)
//! ```
//!
//! Bus units have no such cycle; callers confirm through telemetry instead.

use std::fmt;
use tracing::debug;

use crate::wire::decoder::decode_frame;
use crate::wire::protocol::{code, AddressingMode};

/// Attempts per command before delivery is declared failed
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Status code of a clean acknowledgment
const STATUS_OK: u8 = 0;

/// Status code of a failed integrity check on the unit side
const STATUS_INTEGRITY_ERROR: u8 = 1;

/// Where the driver is in the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPhase {
    #[default]
    Idle,
    Sending,
    AwaitingAck,
}

/// Why a unit did not acknowledge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// Unit reported a CRC/integrity failure
    IntegrityError,
    /// Unit reported a status code we do not know
    UnknownCode(u8),
    /// Nothing arrived before the read timeout
    NoResponse,
    /// Reply is not a valid frame answering the probe
    Garbled,
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::IntegrityError => write!(f, "integrity error"),
            NackReason::UnknownCode(code) => write!(f, "unknown status code {}", code),
            NackReason::NoResponse => write!(f, "no response"),
            NackReason::Garbled => write!(f, "garbled reply"),
        }
    }
}

/// Outcome of one probe as seen by the retry bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Acked,
    NackRetryable(NackReason),
    NackFatal(NackReason),
}

/// Interpret a status-probe reply from the unit at `address`
///
/// The reply must be a valid frame from that unit answering the probe; the
/// status code is the first payload byte. Anything else is garbled.
pub fn classify(mode: AddressingMode, reply: &[u8], address: u8) -> Result<(), NackReason> {
    if reply.is_empty() {
        return Err(NackReason::NoResponse);
    }

    let frame = decode_frame(mode, reply).map_err(|e| {
        debug!("BU#{}. Unreadable status reply: {}", address, e);
        NackReason::Garbled
    })?;

    if frame.address != address || frame.command_code != code::STATUS_PROBE {
        debug!(
            "BU#{}. Status reply from BU#{} with code 0x{:02X} ignored",
            address, frame.address, frame.command_code
        );
        return Err(NackReason::Garbled);
    }

    match frame.payload.first() {
        None => Err(NackReason::Garbled),
        Some(&STATUS_OK) => Ok(()),
        Some(&STATUS_INTEGRITY_ERROR) => Err(NackReason::IntegrityError),
        Some(&other) => Err(NackReason::UnknownCode(other)),
    }
}

/// Bounded retry counter, one per driver
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u8,
    max_attempts: u8,
}

impl RetryState {
    pub fn new(max_attempts: u8) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Failed attempts recorded for the command in flight
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Feed one probe outcome. The counter resets on success and on the
    /// fatal transition.
    pub fn record(&mut self, outcome: Result<(), NackReason>) -> AckStatus {
        match outcome {
            Ok(()) => {
                self.attempts = 0;
                AckStatus::Acked
            }
            Err(reason) => {
                self.attempts += 1;
                if self.attempts < self.max_attempts {
                    AckStatus::NackRetryable(reason)
                } else {
                    self.attempts = 0;
                    AckStatus::NackFatal(reason)
                }
            }
        }
    }

    /// Forget a command abandoned for reasons outside the cycle
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
