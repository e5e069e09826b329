//! # BU Frame Decoder
//!
//! Parses wire bytes back into a [`Frame`], verifying CRC, separator and,
//! on the bus, the group preamble.

use super::crc::crc16;
use super::protocol::*;
use crate::error::FrameError;

/// Decode a complete frame
///
/// # Arguments
///
/// * `mode` - Whether the bytes start with a bus preamble
/// * `bytes` - Complete frame (preamble if any, header, payload, CRC)
///
/// # Errors
///
/// Returns error if:
/// - Frame is shorter than header + CRC
/// - CRC check fails
/// - Separator byte is not 0xAA
/// - Preamble does not select the address carried in the frame
pub fn decode_frame(mode: AddressingMode, bytes: &[u8]) -> Result<Frame, FrameError> {
    let skip = if mode.has_preamble() { PREAMBLE_LEN } else { 0 };
    let min = skip + HEADER_LEN + CRC_LEN;

    if bytes.len() < min {
        return Err(FrameError::Truncated {
            len: bytes.len(),
            min,
        });
    }

    let body = &bytes[skip..];
    let (covered, crc_bytes) = body.split_at(body.len() - CRC_LEN);
    let received = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = crc16(covered);

    if computed != received {
        return Err(FrameError::CrcMismatch {
            expected: computed,
            actual: received,
        });
    }

    if covered[0] != SEPARATOR {
        return Err(FrameError::BadSeparator(covered[0]));
    }

    let address = covered[1];

    if mode.has_preamble() {
        let expected = preamble(address)?;
        if bytes[..PREAMBLE_LEN] != expected {
            return Err(FrameError::PreambleMismatch { address });
        }
    }

    Frame::new(
        address,
        covered[2],
        u16::from_be_bytes([covered[3], covered[4]]),
        covered[HEADER_LEN..].to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoder::encode_frame;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::new(0, code::BEAM_TASK_RESET, 1, Vec::new()).unwrap(),
            Frame::new(5, code::PPM_SWITCH, 2, vec![0x0F; 25]).unwrap(),
            Frame::new(12, code::PHASE_SHIFTER, 0xFFFF, vec![0x81; 35]).unwrap(),
            Frame::new(40, code::ATTENUATOR, 0x1234, vec![0x00; 99]).unwrap(),
        ]
    }

    #[test]
    fn test_decode_round_trip_both_modes() {
        for mode in [AddressingMode::Bus, AddressingMode::PointToPoint] {
            for frame in sample_frames() {
                let bytes = encode_frame(mode, &frame).unwrap();
                assert_eq!(decode_frame(mode, &bytes).unwrap(), frame);
            }
        }
    }

    #[test]
    fn test_decode_frame_too_short() {
        let result = decode_frame(AddressingMode::PointToPoint, &[0xAA, 0x01, 0x02]);
        assert_eq!(result, Err(FrameError::Truncated { len: 3, min: 7 }));

        let result = decode_frame(AddressingMode::Bus, &[0x00, 0x10, 0xEF, 0xAA, 0x01, 0x02, 0x00]);
        assert!(matches!(result, Err(FrameError::Truncated { min: 10, .. })));
    }

    #[test]
    fn test_decode_single_byte_flip_is_detected() {
        let frame = Frame::new(9, code::ATTENUATOR, 77, vec![0x10; 99]).unwrap();
        let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();

        for index in PREAMBLE_LEN..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[index] ^= 0x5A;
            let result = decode_frame(AddressingMode::Bus, &corrupted);
            assert!(
                matches!(result, Err(FrameError::CrcMismatch { .. })),
                "flip at {} gave {:?}",
                index,
                result
            );
        }
    }

    #[test]
    fn test_decode_preamble_flip_is_detected() {
        let frame = Frame::new(9, code::TELEMETRY, 1, Vec::new()).unwrap();
        let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();

        for index in 0..PREAMBLE_LEN {
            let mut corrupted = bytes.clone();
            corrupted[index] ^= 0x01;
            assert_eq!(
                decode_frame(AddressingMode::Bus, &corrupted),
                Err(FrameError::PreambleMismatch { address: 9 })
            );
        }
    }

    #[test]
    fn test_decode_bad_separator_with_valid_crc() {
        let mut body = vec![0x55, 0x01, 0x66, 0x00, 0x01];
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_be_bytes());

        assert_eq!(
            decode_frame(AddressingMode::PointToPoint, &body),
            Err(FrameError::BadSeparator(0x55))
        );
    }
}
