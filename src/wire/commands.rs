//! # Command Encoders
//!
//! One pure encoder per logical operation. Each yields a [`Command`]: the
//! fixed command code plus the operation payload. Addressing, command id and
//! CRC are added by the frame encoder.
//!
//! Byte order is per field and intentionally mixed: frame header fields are
//! big-endian, beam-queue and beam-calibration fields are little-endian.

use bytes::{BufMut, BytesMut};

use super::protocol::*;
use super::state::UnitState;
use crate::error::{AfarError, FrameError, Result};

/// Attenuator payload: 32 elements x 3 slots + 3 MDO slots
pub const ATTENUATOR_PAYLOAD_LEN: usize = 99;

/// First MDO attenuator slot
pub const MDO_ATTENUATOR_OFFSET: usize = 96;

/// Phase/delay payload on the bus (one reserved tail byte)
pub const BUS_PHASE_PAYLOAD_LEN: usize = 35;

/// Phase/delay payload on point-to-point units
pub const POINT_TO_POINT_PHASE_PAYLOAD_LEN: usize = 34;

/// Delay line discrete inside the phase/delay payload
pub const DELAY_OFFSET: usize = 33;

/// High bit of the phase/delay selector: value is a working/calibration value
pub const VALUE_FLAG: u8 = 0x80;

/// High bit of the beam-calibration selector: calibration table bypassed
pub const CALIBRATION_BYPASS_FLAG: u8 = 0x80;

/// VIP masks
pub const VIPS_ON: [u8; 2] = [0xFF, 0xFF];
pub const VIPS_OFF: [u8; 2] = [0x00, 0x00];

/// Encoded operation, ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub code: u8,
    pub payload: Vec<u8>,
}

impl Command {
    fn new(code: u8, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    /// Attach addressing
    pub fn into_frame(self, address: u8, command_id: u16) -> std::result::Result<Frame, FrameError> {
        Frame::new(address, self.code, command_id, self.payload)
    }
}

/// Attenuator for one element and path
pub fn attenuator(element: Element, path: Path, value: u8) -> Command {
    let mut payload = vec![0u8; ATTENUATOR_PAYLOAD_LEN];
    let index = element.bit_position() as usize * 3 + path.attenuator_offset();
    payload[index] = value;
    Command::new(code::ATTENUATOR, payload)
}

/// MDO (output combiner) attenuator for a path
pub fn mdo_attenuator(path: Path, value: u8) -> Command {
    let mut payload = vec![0u8; ATTENUATOR_PAYLOAD_LEN];
    payload[MDO_ATTENUATOR_OFFSET + path.attenuator_offset()] = value;
    Command::new(code::ATTENUATOR, payload)
}

/// Whole attenuator table at once; shorter input is zero-padded
///
/// # Errors
///
/// Returns `InvalidArgument` if more than 99 values are given
pub fn attenuator_bulk(values: &[u8]) -> Result<Command> {
    if values.len() > ATTENUATOR_PAYLOAD_LEN {
        return Err(AfarError::invalid(format!(
            "attenuator table has {} values, at most {} fit",
            values.len(),
            ATTENUATOR_PAYLOAD_LEN
        )));
    }

    let mut payload = vec![0u8; ATTENUATOR_PAYLOAD_LEN];
    payload[..values.len()].copy_from_slice(values);
    Ok(Command::new(code::ATTENUATOR, payload))
}

/// Selector byte of phase/delay payloads.
///
/// Bus units always receive the value flag; point-to-point units only when
/// a calibration value is being set.
pub fn phase_selector(mode: AddressingMode, path: Path, calibrated: bool) -> u8 {
    let flagged = match mode {
        AddressingMode::Bus => true,
        AddressingMode::PointToPoint => calibrated,
    };

    if flagged {
        path.selector() | VALUE_FLAG
    } else {
        path.selector()
    }
}

fn phase_payload(mode: AddressingMode, path: Path, calibrated: bool) -> Vec<u8> {
    let len = match mode {
        AddressingMode::Bus => BUS_PHASE_PAYLOAD_LEN,
        AddressingMode::PointToPoint => POINT_TO_POINT_PHASE_PAYLOAD_LEN,
    };
    let mut payload = vec![0u8; len];
    payload[0] = phase_selector(mode, path, calibrated);
    payload
}

/// Phase shifter code for one element. The code lands at the element number.
pub fn phase_shifter(
    mode: AddressingMode,
    element: Element,
    path: Path,
    phase: PhaseCode,
    calibrated: bool,
) -> Command {
    let mut payload = phase_payload(mode, path, calibrated);
    payload[element.number() as usize] = phase.value();
    Command::new(code::PHASE_SHIFTER, payload)
}

/// Consecutive phase codes starting with element 1
///
/// # Errors
///
/// Returns `InvalidArgument` for more than 32 codes
pub fn phase_shifter_bulk(
    mode: AddressingMode,
    path: Path,
    phases: &[PhaseCode],
    calibrated: bool,
) -> Result<Command> {
    if phases.len() > ELEMENTS_PER_UNIT as usize {
        return Err(AfarError::invalid(format!(
            "{} phase codes given, a unit has {} elements",
            phases.len(),
            ELEMENTS_PER_UNIT
        )));
    }

    let mut payload = phase_payload(mode, path, calibrated);
    for (slot, phase) in payload[1..].iter_mut().zip(phases) {
        *slot = phase.value();
    }
    Ok(Command::new(code::PHASE_SHIFTER, payload))
}

/// Delay line discrete; shares the phase shifter code
pub fn delay_line(mode: AddressingMode, path: Path, discrete: u8, calibrated: bool) -> Command {
    let mut payload = phase_payload(mode, path, calibrated);
    payload[DELAY_OFFSET] = discrete;
    Command::new(code::DELAY_LINE, payload)
}

/// Push the full enable bitmask
pub fn ppm_switch(state: &UnitState) -> Command {
    Command::new(code::PPM_SWITCH, state.snapshot().to_vec())
}

/// Power supplies on/off
pub fn vip_power(on: bool) -> Command {
    let mask = if on { VIPS_ON } else { VIPS_OFF };
    Command::new(code::VIP_POWER, mask.to_vec())
}

/// Parameters of the beam-calibration mode command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamCalibration {
    pub path: Path,
    /// Apply the loaded calibration table
    pub with_calibration: bool,
    pub table_number: u16,
    /// Table CRC as supplied by the caller, sent verbatim
    pub table_crc: [u8; 2],
    pub beam_number: u16,
    pub strobes: u8,
}

/// Beam-calibration mode
pub fn beam_calibration(params: &BeamCalibration) -> Command {
    let mut selector = params.path.selector();
    if !params.with_calibration {
        selector |= CALIBRATION_BYPASS_FLAG;
    }

    let mut payload = BytesMut::with_capacity(8);
    payload.put_u8(selector);
    payload.put_u16_le(params.table_number);
    payload.put_slice(&params.table_crc);
    payload.put_u16_le(params.beam_number);
    payload.put_u8(params.strobes);

    Command::new(code::BEAM_CALIBRATION, payload.to_vec())
}

/// Parameters of the bench calibration mode command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchCalibration {
    pub path: Path,
    pub delay: u8,
    pub phase: PhaseCode,
    pub ppm_attenuator: u8,
    pub mdo_attenuator: u8,
    pub strobes: u8,
}

/// Bench calibration mode: 6 bytes, bare selector nibble
pub fn bench_calibration(params: &BenchCalibration) -> Command {
    let payload = vec![
        params.path.selector(),
        params.delay,
        params.phase.value(),
        params.ppm_attenuator,
        params.mdo_attenuator,
        params.strobes,
    ];
    Command::new(code::BENCH_CALIBRATION, payload)
}

/// Drop the queued beam task
pub fn task_reset() -> Command {
    Command::new(code::BEAM_TASK_RESET, Vec::new())
}

/// One beam-queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamTask {
    pub rx_beam: u16,
    pub tx_beam: u16,
    pub strobes: u32,
    /// Repeat the queue when it runs out
    pub cycle: bool,
}

/// Append a beam to the task queue
pub fn task_append(task: &BeamTask) -> Command {
    let mut payload = BytesMut::with_capacity(9);
    payload.put_u16_le(task.rx_beam);
    payload.put_u16_le(task.tx_beam);
    payload.put_u32_le(task.strobes);
    payload.put_u8(u8::from(task.cycle));

    Command::new(code::BEAM_TASK_APPEND, payload.to_vec())
}

pub fn telemetry_request() -> Command {
    Command::new(code::TELEMETRY, Vec::new())
}

pub fn status_probe() -> Command {
    Command::new(code::STATUS_PROBE, Vec::new())
}
