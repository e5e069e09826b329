//! # Telemetry Decoder
//!
//! Fixed-offset decoding of the telemetry reply body (reply header already
//! stripped). Integers are little-endian.
//!
//! ```text
//! 0..64    32 x raw element words     82..86   TX strobe counter
//! 64..67   MDO raw bytes              86..90   RX strobe counter
//! 67       temperature                90..92   active beam count
//! 68..70   VIP1 status                92..94   active TX beam
//! 70..72   VIP2 status                94..96   active RX beam
//! 72..74   beam table number          96       port configuration
//! 74..78   beam table CRC             97..101  voltage table CRC
//! 78..82   calibration table CRC      101      unit state
//! ```

use bytes::Buf;
use serde::Serialize;

use super::protocol::ELEMENTS_PER_UNIT;
use crate::error::DecodeError;

/// Minimum telemetry body length
pub const TELEMETRY_BODY_LEN: usize = 102;

/// Decoded telemetry snapshot of one control unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    /// Raw 2-byte status word per element
    pub elements: [[u8; 2]; ELEMENTS_PER_UNIT as usize],
    /// Raw MDO status bytes
    pub mdo: [u8; 3],
    pub temperature: u8,
    pub vip1: u16,
    pub vip2: u16,
    pub beam_table_number: u16,
    pub beam_table_crc: u32,
    pub calibration_table_crc: u32,
    pub tx_strobes: u32,
    pub rx_strobes: u32,
    pub beam_count: u16,
    pub tx_beam: u16,
    pub rx_beam: u16,
    pub port_configuration: u8,
    pub voltage_table_crc: u32,
    pub unit_state: u8,
}

/// Decode a telemetry body
///
/// # Errors
///
/// Returns `DecodeError::TooShort` if fewer than 102 bytes are given.
/// No partially-filled record is ever produced.
pub fn decode_telemetry(body: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    if body.len() < TELEMETRY_BODY_LEN {
        return Err(DecodeError::TooShort {
            len: body.len(),
            min: TELEMETRY_BODY_LEN,
        });
    }

    let mut buf = &body[..TELEMETRY_BODY_LEN];

    let mut elements = [[0u8; 2]; ELEMENTS_PER_UNIT as usize];
    for word in elements.iter_mut() {
        buf.copy_to_slice(word);
    }

    let mut mdo = [0u8; 3];
    buf.copy_to_slice(&mut mdo);

    Ok(TelemetryRecord {
        elements,
        mdo,
        temperature: buf.get_u8(),
        vip1: buf.get_u16_le(),
        vip2: buf.get_u16_le(),
        beam_table_number: buf.get_u16_le(),
        beam_table_crc: buf.get_u32_le(),
        calibration_table_crc: buf.get_u32_le(),
        tx_strobes: buf.get_u32_le(),
        rx_strobes: buf.get_u32_le(),
        beam_count: buf.get_u16_le(),
        tx_beam: buf.get_u16_le(),
        rx_beam: buf.get_u16_le(),
        port_configuration: buf.get_u8(),
        voltage_table_crc: buf.get_u32_le(),
        unit_state: buf.get_u8(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::TELEMETRY_BODY_LEN;

    /// Body with a distinct, recognisable value in every field
    pub fn sample_body() -> Vec<u8> {
        let mut body = vec![0u8; TELEMETRY_BODY_LEN];
        for (j, chunk) in body[..64].chunks_mut(2).enumerate() {
            chunk[0] = j as u8;
            chunk[1] = 0x80 | j as u8;
        }
        body[64..67].copy_from_slice(&[0xD0, 0xD1, 0xD2]);
        body[67] = 42;
        body[68..70].copy_from_slice(&0x1111u16.to_le_bytes());
        body[70..72].copy_from_slice(&0x2222u16.to_le_bytes());
        body[72..74].copy_from_slice(&7u16.to_le_bytes());
        body[74..78].copy_from_slice(&0xA1A2A3A4u32.to_le_bytes());
        body[78..82].copy_from_slice(&0xB1B2B3B4u32.to_le_bytes());
        body[82..86].copy_from_slice(&100_000u32.to_le_bytes());
        body[86..90].copy_from_slice(&200_000u32.to_le_bytes());
        body[90..92].copy_from_slice(&12u16.to_le_bytes());
        body[92..94].copy_from_slice(&3u16.to_le_bytes());
        body[94..96].copy_from_slice(&4u16.to_le_bytes());
        body[96] = 0x5C;
        body[97..101].copy_from_slice(&0xC1C2C3C4u32.to_le_bytes());
        body[101] = 0x01;
        body
    }
}
