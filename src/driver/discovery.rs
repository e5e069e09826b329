//! # Unit Discovery
//!
//! Finds out which unit sits behind a point-to-point link by sending a
//! telemetry request to every candidate address until one answers with a
//! valid frame.

use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::transport::Transport;
use crate::wire::commands;
use crate::wire::decoder::decode_frame;
use crate::wire::encoder::encode_frame;
use crate::wire::protocol::AddressingMode;

/// Addresses probed, in order
pub const DISCOVERY_RANGE: RangeInclusive<u8> = 1..=44;

/// Ask every address in [`DISCOVERY_RANGE`] for telemetry
///
/// Returns the address the unit reports about itself from the first reply
/// that decodes as a frame, or `None` when nobody answered.
///
/// # Errors
///
/// Link failures are returned as-is; silence and unreadable replies are
/// not errors.
pub async fn discover<T: Transport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
) -> Result<Option<u8>> {
    for address in DISCOVERY_RANGE {
        let frame = commands::telemetry_request().into_frame(address, 0)?;
        let bytes = encode_frame(AddressingMode::PointToPoint, &frame)?;

        transport.write_all(&bytes).await?;
        let reply = transport.read_reply(timeout).await?;

        if reply.is_empty() {
            debug!("No answer at address {}", address);
            continue;
        }

        match decode_frame(AddressingMode::PointToPoint, &reply) {
            Ok(frame) => {
                info!("BU#{}. Answered discovery request at address {}", frame.address, address);
                return Ok(Some(frame.address));
            }
            Err(e) => debug!("Unreadable reply at address {} ignored: {}", address, e),
        }
    }

    Ok(None)
}
