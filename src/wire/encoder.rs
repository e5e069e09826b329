//! # BU Frame Encoder
//!
//! Wraps a payload with addressing and CRC.
//!
//! ```text
//! [preamble(3)] | AA | addr | code | id_hi id_lo | payload... | crc_hi crc_lo
//!  bus only      \________________ CRC-covered ________________/
//! ```

use bytes::{BufMut, BytesMut};

use super::crc::crc16;
use super::protocol::*;
use crate::error::FrameError;

/// Rolling command id for the bus variant.
///
/// Yields 1, 2, ..., 65535, then 1 again. Zero is never produced.
#[derive(Debug, Clone)]
pub struct CommandCounter {
    next: u16,
}

impl CommandCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Id the next frame will carry
    pub fn peek(&self) -> u16 {
        self.next
    }

    /// Take the current id and advance
    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = if id == u16::MAX { 1 } else { id + 1 };
        id
    }
}

impl Default for CommandCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a frame into wire bytes
///
/// # Arguments
///
/// * `mode` - Bus frames get the group preamble, point-to-point frames do not
/// * `frame` - Address, code, id and payload
///
/// # Errors
///
/// Returns `FrameError::InvalidAddress` on the bus for addresses above 40
///
/// # Examples
///
/// ```
/// use afar_bench::wire::encoder::encode_frame;
/// use afar_bench::wire::protocol::{code, AddressingMode, Frame};
///
/// let frame = Frame::new(1, code::BEAM_TASK_RESET, 1, Vec::new()).unwrap();
/// let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();
/// assert_eq!(bytes, [0x00, 0x10, 0xEF, 0xAA, 0x01, 0x66, 0x00, 0x01, 0xD2, 0x5A]);
/// ```
pub fn encode_frame(mode: AddressingMode, frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let preamble = if mode.has_preamble() {
        Some(preamble(frame.address)?)
    } else {
        None
    };

    let mut body = BytesMut::with_capacity(frame.wire_len());
    body.put_u8(SEPARATOR);
    body.put_u8(frame.address);
    body.put_u8(frame.command_code);
    body.put_u16(frame.command_id);
    body.put_slice(&frame.payload);

    // Preamble is prepended after the CRC and is not covered by it
    let crc = crc16(&body);
    body.put_u16(crc);

    let mut out = Vec::with_capacity(PREAMBLE_LEN + body.len());
    if let Some(preamble) = preamble {
        out.extend_from_slice(&preamble);
    }
    out.extend_from_slice(&body);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_one() {
        let mut counter = CommandCounter::new();
        assert_eq!(counter.peek(), 1);
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
        assert_eq!(counter.peek(), 3);
    }

    #[test]
    fn test_counter_rollover_sequence() {
        let mut counter = CommandCounter::new();
        let mut previous = counter.next_id();
        assert_eq!(previous, 1);

        // 1..=65535 in order, then back to 1
        for _ in 1..u16::MAX {
            let id = counter.next_id();
            assert_eq!(id, previous + 1);
            previous = id;
        }
        assert_eq!(previous, u16::MAX);
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
    }

    #[test]
    fn test_counter_never_yields_zero() {
        let mut counter = CommandCounter::new();
        for _ in 0..(2 * u16::MAX as u32 + 10) {
            assert_ne!(counter.next_id(), 0);
        }
    }

    #[test]
    fn test_encode_bus_frame_structure() {
        let frame = Frame::new(12, code::TELEMETRY, 1, Vec::new()).unwrap();
        let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();

        assert_eq!(&bytes[..3], &[0x00, 0x12, 0xED]);
        assert_eq!(bytes[3], SEPARATOR);
        assert_eq!(bytes[4], 12);
        assert_eq!(bytes[5], code::TELEMETRY);
        assert_eq!(&bytes[6..8], &[0x00, 0x01]);
        assert_eq!(&bytes[8..], &[0xE6, 0x84]);
    }

    #[test]
    fn test_encode_point_to_point_has_no_preamble() {
        let frame = Frame::new(7, code::STATUS_PROBE, 0, Vec::new()).unwrap();
        let bytes = encode_frame(AddressingMode::PointToPoint, &frame).unwrap();

        assert_eq!(bytes, vec![0xAA, 0x07, 0xFB, 0x00, 0x00, 0xDF, 0x8A]);
    }

    #[test]
    fn test_encode_broadcast_preamble() {
        let frame = Frame::new(0, code::BEAM_TASK_RESET, 5, Vec::new()).unwrap();
        let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();
        assert_eq!(&bytes[..3], &[0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_encode_command_id_big_endian() {
        let frame = Frame::new(1, code::BEAM_TASK_RESET, 0x1234, Vec::new()).unwrap();
        let bytes = encode_frame(AddressingMode::PointToPoint, &frame).unwrap();
        assert_eq!(&bytes[3..5], &[0x12, 0x34]);
    }

    #[test]
    fn test_encode_crc_excludes_preamble() {
        let frame = Frame::new(3, code::PPM_SWITCH, 9, vec![0x01, 0x02]).unwrap();
        let bus = encode_frame(AddressingMode::Bus, &frame).unwrap();
        let p2p = encode_frame(AddressingMode::PointToPoint, &frame).unwrap();

        assert_eq!(&bus[PREAMBLE_LEN..], &p2p[..]);
        let crc = crc16(&p2p[..p2p.len() - CRC_LEN]);
        assert_eq!(&p2p[p2p.len() - CRC_LEN..], &crc.to_be_bytes());
    }

    #[test]
    fn test_encode_rejects_address_outside_bus() {
        let frame = Frame::new(41, code::TELEMETRY, 1, Vec::new()).unwrap();
        assert_eq!(
            encode_frame(AddressingMode::Bus, &frame),
            Err(FrameError::InvalidAddress(41))
        );
        // Point-to-point carries any address byte
        assert!(encode_frame(AddressingMode::PointToPoint, &frame).is_ok());
    }
}
