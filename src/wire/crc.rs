//! # CRC-16 Implementation
//!
//! CRC-16 checksum used by the BU protocol.
//!
//! **Polynomial**: 0x1021 (x^16 + x^12 + x^5 + 1)
//! **Initial Value**: 0x1D0F
//!
//! MSB-first, no reflection, no final XOR. The seed differs from the usual
//! CCITT seeds (0x0000 / 0xFFFF); the units reject anything else.

/// CRC-16 polynomial
pub const CRC16_POLY: u16 = 0x1021;

/// CRC-16 seed
pub const CRC16_INIT: u16 = 0x1D0F;

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the frame CRC using the lookup table
///
/// # Arguments
///
/// * `data` - Byte slice to checksum (separator through end of payload)
///
/// # Examples
///
/// ```
/// use afar_bench::wire::crc::crc16;
///
/// assert_eq!(crc16(b""), 0x1D0F);
/// assert_eq!(crc16(b"123456789"), 0xE5CC);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        let index = ((crc >> 8) ^ byte as u16) & 0xFF;
        crc = (crc << 8) ^ CRC16_TABLE[index as usize];
    }

    crc
}

/// Bit-serial reference: compares the register MSB with each data bit,
/// MSB first. Used to verify the table.
#[allow(dead_code)]
fn crc16_bitwise(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        let mut byte = byte;
        for _ in 0..8 {
            let data_bit = (byte >> 7) & 1;
            let crc_msb = ((crc >> 15) & 1) as u8;

            if crc_msb ^ data_bit != 0 {
                crc = (crc << 1) ^ CRC16_POLY;
            } else {
                crc <<= 1;
            }
            byte <<= 1;
        }
    }

    crc
}
