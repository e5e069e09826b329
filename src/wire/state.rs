//! # Unit State Store
//!
//! Per-unit enable bitmask, resent as a whole with every PPM switch command.
//!
//! ```text
//! byte  0..=3   TX/H  elements 1-8, 9-16, 17-24, 25-32 (bit n = element 8k+n+1)
//! byte  4..=7   TX/V
//! byte  8..=11  RX/H
//! byte 12..=15  RX/V
//! byte 16       summary: bit k set while any element of path k is on
//! byte 17..     reserved (bus variant only)
//! ```

use super::protocol::{AddressingMode, Element, Path};

/// Bytes per path group (32 elements / 8)
const GROUP_BYTES: usize = 4;

/// Offset of the summary byte
pub const SUMMARY_BYTE: usize = 16;

/// Buffer size on the bus
pub const BUS_STATE_LEN: usize = 25;

/// Buffer size on point-to-point units (no reserved tail)
pub const POINT_TO_POINT_STATE_LEN: usize = 17;

/// Enable bitmask of one control unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitState {
    bits: Vec<u8>,
}

impl UnitState {
    /// Zeroed buffer sized for the addressing mode
    pub fn new(mode: AddressingMode) -> Self {
        let len = match mode {
            AddressingMode::Bus => BUS_STATE_LEN,
            AddressingMode::PointToPoint => POINT_TO_POINT_STATE_LEN,
        };
        Self { bits: vec![0; len] }
    }

    /// Switch one element of one path on or off.
    ///
    /// Only the element's own bit and the path's summary bit change.
    pub fn set_element(&mut self, element: Element, path: Path, on: bool) {
        let (byte, mask) = Self::locate(element, path);

        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }

        self.refresh_summary(path);
    }

    pub fn is_on(&self, element: Element, path: Path) -> bool {
        let (byte, mask) = Self::locate(element, path);
        self.bits[byte] & mask != 0
    }

    /// Summary flag for a path
    pub fn any_on(&self, path: Path) -> bool {
        self.bits[SUMMARY_BYTE] & path.selector() != 0
    }

    /// Clear every element of every path
    pub fn clear_all(&mut self) {
        self.bits.fill(0);
    }

    /// Full buffer for transmission
    pub fn snapshot(&self) -> &[u8] {
        &self.bits
    }

    fn locate(element: Element, path: Path) -> (usize, u8) {
        let bit = element.bit_position() as usize;
        let byte = path.group() * GROUP_BYTES + bit / 8;
        (byte, 1 << (bit % 8))
    }

    fn refresh_summary(&mut self, path: Path) {
        let start = path.group() * GROUP_BYTES;
        let any = self.bits[start..start + GROUP_BYTES].iter().any(|&b| b != 0);

        if any {
            self.bits[SUMMARY_BYTE] |= path.selector();
        } else {
            self.bits[SUMMARY_BYTE] &= !path.selector();
        }
    }
}
