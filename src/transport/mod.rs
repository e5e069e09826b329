//! # Transport Module
//!
//! Byte-oriented links to the control units.
//!
//! This module handles:
//! - The `Transport` trait the protocol layer is written against
//! - Serial binding (921,600 baud, 8N2) for bus and point-to-point units
//! - UDP binding for IP-reachable units
//! - Opening the configured link
//!
//! Reads are bounded by a timeout. A read that sees nothing before the
//! timeout returns an empty buffer rather than an error, so polling loops can
//! tell "no data" apart from a broken link.

pub mod serial;
pub mod udp;

#[cfg(test)]
pub mod mocks;

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::config::{LinkConfig, LinkKind};
use crate::error::Result;

pub use serial::SerialTransport;
pub use udp::UdpTransport;

/// Physical channel to one or many control units
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Write a complete frame. Input still pending from earlier exchanges is
    /// discarded first, so the next read sees only what answers this frame.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for a reply. Empty when nothing arrived.
    async fn read_reply(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Release the link. Further I/O fails with `LinkNotOpen`.
    async fn close(&mut self) -> Result<()>;

    /// Human-readable peer description for logs
    fn describe(&self) -> String;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data).await
    }

    async fn read_reply(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_reply(timeout).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open the link described by the configuration
///
/// # Errors
///
/// Returns error if the serial device cannot be opened or the UDP socket
/// cannot be bound/connected
pub async fn connect(config: &LinkConfig) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.kind {
        LinkKind::Serial => Box::new(SerialTransport::open(&config.port, config.baud_rate)?),
        LinkKind::Udp => Box::new(UdpTransport::connect(&config.host, config.udp_port).await?),
    };

    info!("Link opened: {}", transport.describe());
    Ok(transport)
}

/// Hex dump for frame logging
pub(crate) fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::mocks::ScriptedTransport;
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(&[0x00, 0xAA, 0x0F]), "00 AA 0F");
        assert_eq!(hex(&[]), "");
    }

    #[tokio::test]
    async fn test_boxed_transport_delegates() {
        let mock = ScriptedTransport::new();
        let handle = mock.clone();
        mock.queue_reply(vec![0x01, 0x02]);

        let mut boxed: Box<dyn Transport> = Box::new(mock);
        boxed.write_all(&[0xAA]).await.unwrap();
        let reply = boxed.read_reply(Duration::from_millis(10)).await.unwrap();

        assert_eq!(reply, vec![0x01, 0x02]);
        assert_eq!(handle.written(), vec![vec![0xAA]]);
        assert_eq!(boxed.describe(), "scripted");
    }

    #[tokio::test]
    async fn test_mockall_transport_expectations() {
        let mut mock = MockTransport::new();
        mock.expect_write_all().times(1).returning(|_| Ok(()));
        mock.expect_read_reply().times(1).returning(|_| Ok(Vec::new()));

        mock.write_all(&[0xAA, 0x01]).await.unwrap();
        let reply = mock.read_reply(Duration::from_millis(1)).await.unwrap();
        assert!(reply.is_empty());
    }
}
