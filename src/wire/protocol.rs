//! # BU Protocol Constants and Types
//!
//! Core protocol definitions for control-unit (BU) communication.

use std::fmt;

use crate::error::{AfarError, FrameError, Result};

/// Separator byte opening the CRC-covered part of every frame
pub const SEPARATOR: u8 = 0xAA;

/// Preamble length on the multi-drop bus
pub const PREAMBLE_LEN: usize = 3;

/// separator(1) + address(1) + command_code(1) + command_id(2)
pub const HEADER_LEN: usize = 5;

/// Trailing big-endian CRC-16
pub const CRC_LEN: usize = 2;

/// Highest unit address reachable through a bus preamble
pub const MAX_BUS_ADDRESS: u8 = 40;

/// Address used for broadcast / initialization
pub const BROADCAST_ADDRESS: u8 = 0;

/// Elements (PPMs) per control unit
pub const ELEMENTS_PER_UNIT: u8 = 32;

/// Largest payload a single frame may carry
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Phase shifter resolution: 64 codes per full circle
pub const PHASE_CODES: u8 = 64;

/// Degrees per phase code
pub const PHASE_STEP_DEGREES: f64 = 5.625;

/// Command codes
pub mod code {
    /// Phase shifter and delay line share one code
    pub const PHASE_SHIFTER: u8 = 0x02;
    pub const DELAY_LINE: u8 = 0x02;
    pub const ATTENUATOR: u8 = 0x09;
    pub const VIP_POWER: u8 = 0x0B;
    pub const PPM_SWITCH: u8 = 0x33;
    pub const BEAM_TASK_APPEND: u8 = 0x65;
    pub const BEAM_TASK_RESET: u8 = 0x66;
    pub const BENCH_CALIBRATION: u8 = 0xC9;
    pub const BEAM_CALIBRATION: u8 = 0xD9;
    pub const TELEMETRY: u8 = 0xFA;
    pub const STATUS_PROBE: u8 = 0xFB;
}

/// Signal direction through an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Transmitter,
    Receiver,
}

/// Antenna polarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarization {
    Horizontal,
    Vertical,
}

/// One of the four (channel, polarization) signal paths of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Path {
    pub channel: Channel,
    pub polarization: Polarization,
}

impl Path {
    pub const TX_H: Path = Path::new(Channel::Transmitter, Polarization::Horizontal);
    pub const TX_V: Path = Path::new(Channel::Transmitter, Polarization::Vertical);
    pub const RX_H: Path = Path::new(Channel::Receiver, Polarization::Horizontal);
    pub const RX_V: Path = Path::new(Channel::Receiver, Polarization::Vertical);

    /// All paths in state-buffer group order
    pub const ALL: [Path; 4] = [Path::TX_H, Path::TX_V, Path::RX_H, Path::RX_V];

    pub const fn new(channel: Channel, polarization: Polarization) -> Self {
        Self {
            channel,
            polarization,
        }
    }

    /// Group index 0..=3 (TxH, TxV, RxH, RxV)
    pub const fn group(self) -> usize {
        match (self.channel, self.polarization) {
            (Channel::Transmitter, Polarization::Horizontal) => 0,
            (Channel::Transmitter, Polarization::Vertical) => 1,
            (Channel::Receiver, Polarization::Horizontal) => 2,
            (Channel::Receiver, Polarization::Vertical) => 3,
        }
    }

    /// Selector nibble: one bit per path, in group order
    pub const fn selector(self) -> u8 {
        1 << self.group()
    }

    /// Attenuator slot inside an element's 3-byte triplet.
    ///
    /// The transmit attenuator is shared by both polarizations.
    pub const fn attenuator_offset(self) -> usize {
        match (self.channel, self.polarization) {
            (Channel::Transmitter, _) => 0,
            (Channel::Receiver, Polarization::Horizontal) => 1,
            (Channel::Receiver, Polarization::Vertical) => 2,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self.channel {
            Channel::Transmitter => "TX",
            Channel::Receiver => "RX",
        };
        let pol = match self.polarization {
            Polarization::Horizontal => "H",
            Polarization::Vertical => "V",
        };
        write!(f, "{}/{}", ch, pol)
    }
}

/// Validated 1-based element (PPM) number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Element(u8);

impl Element {
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `number` is in 1..=32
    pub fn new(number: u8) -> Result<Self> {
        if number == 0 || number > ELEMENTS_PER_UNIT {
            return Err(AfarError::invalid(format!(
                "element number {} is outside 1..={}",
                number, ELEMENTS_PER_UNIT
            )));
        }
        Ok(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// 0-based bit position 0..=31
    pub fn bit_position(self) -> u8 {
        self.0 - 1
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PPM#{}", self.0)
    }
}

/// 6-bit phase shifter code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCode(u8);

impl PhaseCode {
    /// # Errors
    ///
    /// Returns `InvalidArgument` for codes above 63
    pub fn new(code: u8) -> Result<Self> {
        if code >= PHASE_CODES {
            return Err(AfarError::invalid(format!(
                "phase code {} is outside 0..={}",
                code,
                PHASE_CODES - 1
            )));
        }
        Ok(Self(code))
    }

    /// Nearest-below code for an angle, wrapped modulo 360°
    pub fn from_degrees(degrees: f64) -> Self {
        let wrapped = degrees.rem_euclid(360.0);
        let code = (wrapped / PHASE_STEP_DEGREES).floor() as u8 % PHASE_CODES;
        Self(code)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn degrees(self) -> f64 {
        self.0 as f64 * PHASE_STEP_DEGREES
    }
}

/// Wire-format variant selected by the physical link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Shared bus (or UDP gateway): preamble-selected groups, rolling command ids,
    /// no acknowledgment cycle
    Bus,
    /// Single addressable unit: no preamble, command id always 0,
    /// status probe + bounded retry after every command
    PointToPoint,
}

impl AddressingMode {
    pub fn has_preamble(self) -> bool {
        matches!(self, AddressingMode::Bus)
    }

    pub fn acknowledges(self) -> bool {
        matches!(self, AddressingMode::PointToPoint)
    }
}

/// One BU protocol frame, without preamble and CRC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Unit address (0 = broadcast)
    pub address: u8,

    /// Operation selector
    pub command_code: u8,

    /// Rolling id (always 0 on point-to-point links)
    pub command_id: u16,

    /// Operation-specific payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PayloadTooLarge` if the payload exceeds
    /// `MAX_PAYLOAD_SIZE`
    pub fn new(
        address: u8,
        command_code: u8,
        command_id: u16,
        payload: Vec<u8>,
    ) -> std::result::Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }

        Ok(Self {
            address,
            command_code,
            command_id,
            payload,
        })
    }

    /// Length on the wire excluding the preamble
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + CRC_LEN
    }
}

/// Bus group selector for a unit address (8 units per group)
///
/// # Errors
///
/// Returns `FrameError::InvalidAddress` for addresses above 40
pub fn preamble(address: u8) -> std::result::Result<[u8; PREAMBLE_LEN], FrameError> {
    match address {
        0 => Ok([0x00, 0xFF, 0x00]),
        1..=8 => Ok([0x00, 0x10, 0xEF]),
        9..=16 => Ok([0x00, 0x12, 0xED]),
        17..=24 => Ok([0x00, 0x14, 0xEB]),
        25..=32 => Ok([0x00, 0x16, 0xE9]),
        33..=40 => Ok([0x00, 0x18, 0xE7]),
        other => Err(FrameError::InvalidAddress(other)),
    }
}
