//! # Serial Link
//!
//! Opens the RS-485 adapter at 921,600 baud, 8 data bits, no parity,
//! two stop bits.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt};
use tracing::{debug, info, warn};

use super::{hex, Transport};
use crate::error::{Result, TransportError};

/// Unit bus baud rate
pub const BU_BAUD_RATE: u32 = 921_600;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-RS485 adapters
    "/dev/ttyACM0", // USB CDC devices
];

/// Quiet time that ends a reply once its first bytes arrived
const INTER_BYTE_GAP: Duration = Duration::from_millis(5);

/// Largest reply we buffer
const MAX_REPLY_LEN: usize = 4096;

/// Serial link to the unit bus or a single unit
pub struct SerialTransport {
    /// `None` once closed
    port: Option<tokio_serial::SerialStream>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .field("open", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open a specific device
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Open` if the device cannot be opened
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        info!("Opened serial port {} at {} baud", path, baud_rate);

        Ok(Self {
            port: Some(port),
            device_path: path.to_string(),
        })
    }

    /// Try device paths in order, keep the first that opens
    ///
    /// # Errors
    ///
    /// Returns `TransportError::PortNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open(path, baud_rate) {
                Ok(transport) => return Ok(transport),
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(TransportError::PortNotFound(paths.join(", ")).into())
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::Two)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::Open(format!("{}: {}", path, e)))?;

        Ok(port)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn port(&mut self) -> Result<&mut tokio_serial::SerialStream> {
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::LinkNotOpen.into())
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;

        // Late replies to earlier frames must not be read as the answer to this one
        port.clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Write(format!("clear input: {}", e)))?;

        port.write_all(data)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| TransportError::Write(format!("flush: {}", e)))?;

        debug!(">> {}", hex(data));
        Ok(())
    }

    async fn read_reply(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let port = self.port()?;
        let mut reply = Vec::new();
        let mut chunk = [0u8; 256];

        // First bytes: wait up to the full timeout
        match tokio::time::timeout(timeout, port.read(&mut chunk)).await {
            Err(_) => {
                debug!("No data within {:?}", timeout);
                return Ok(reply);
            }
            Ok(Err(e)) => return Err(TransportError::Read(e.to_string()).into()),
            Ok(Ok(n)) => reply.extend_from_slice(&chunk[..n]),
        }

        // Remainder: keep reading until the line goes quiet
        while reply.len() < MAX_REPLY_LEN {
            match tokio::time::timeout(INTER_BYTE_GAP, port.read(&mut chunk)).await {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Err(e)) => return Err(TransportError::Read(e.to_string()).into()),
                Ok(Ok(n)) => reply.extend_from_slice(&chunk[..n]),
            }
        }

        debug!("<< {}", hex(&reply));
        Ok(reply)
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!("Closed serial port {}", self.device_path);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial {}", self.device_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AfarError;

    #[test]
    fn test_constants() {
        assert_eq!(BU_BAUD_RATE, 921_600);
        assert_eq!(DEFAULT_DEVICE_PATHS.len(), 2);
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = SerialTransport::open_with_paths(invalid_paths, BU_BAUD_RATE);

        match result {
            Err(AfarError::Transport(TransportError::PortNotFound(msg))) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected PortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = SerialTransport::open_with_paths(empty_paths, BU_BAUD_RATE);
        assert!(matches!(
            result,
            Err(AfarError::Transport(TransportError::PortNotFound(_)))
        ));
    }

    #[test]
    fn test_open_invalid_path_returns_open_error() {
        let result = SerialTransport::open("/dev/nonexistent_serial_device_12345", BU_BAUD_RATE);

        match result {
            Err(AfarError::Transport(TransportError::Open(msg))) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
            }
            other => panic!("Expected Open error, got: {:?}", other),
        }
    }

    // Integration test - only runs if unit hardware is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_telemetry_request_with_real_hardware() {
        use crate::wire::{commands, encoder::encode_frame, protocol::AddressingMode};

        let Ok(mut serial) = SerialTransport::open_with_paths(DEFAULT_DEVICE_PATHS, BU_BAUD_RATE)
        else {
            println!("No unit hardware detected (skipping)");
            return;
        };

        let frame = commands::telemetry_request().into_frame(1, 1).unwrap();
        let bytes = encode_frame(AddressingMode::Bus, &frame).unwrap();
        serial.write_all(&bytes).await.unwrap();
        let reply = serial.read_reply(Duration::from_secs(1)).await.unwrap();
        println!("Reply: {}", hex(&reply));
    }
}
