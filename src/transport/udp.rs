//! # UDP Link
//!
//! Connected datagram socket to an IP-reachable unit or bus gateway.
//! One datagram carries one frame.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::{hex, Transport};
use crate::error::{Result, TransportError};

/// Byte sent on connect so the gateway learns our address
const HELLO: &[u8] = b" ";

/// Largest datagram we accept
const MAX_DATAGRAM: usize = 65_536;

/// UDP link
#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port, connect it to `host:port` and send the
    /// hello byte
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Open` if the address does not resolve or the
    /// socket cannot be bound/connected
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| TransportError::Open(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| TransportError::Open(format!("{}:{} did not resolve", host, port)))?;

        Self::connect_addr(peer).await
    }

    /// Same as [`UdpTransport::connect`] with a resolved address
    pub async fn connect_addr(peer: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::Open(format!("bind {}: {}", local, e)))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| TransportError::Open(format!("{}: {}", peer, e)))?;
        socket
            .send(HELLO)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;

        info!("UDP link connected to {}", peer);
        Ok(Self {
            socket: Some(socket),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| TransportError::LinkNotOpen.into())
    }
}

/// Drop every datagram already queued on the socket
fn discard_pending(socket: &UdpSocket) -> usize {
    let mut buf = [0u8; 512];
    let mut count = 0;
    while socket.try_recv(&mut buf).is_ok() {
        count += 1;
    }
    count
}

#[async_trait]
impl Transport for UdpTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket()?;

        let stale = discard_pending(socket);
        if stale > 0 {
            debug!("Discarded {} stale datagram(s)", stale);
        }

        let sent = socket
            .send(data)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;

        if sent != data.len() {
            return Err(TransportError::Write(format!(
                "short datagram: {} of {} bytes",
                sent,
                data.len()
            ))
            .into());
        }

        debug!(">> {}", hex(data));
        Ok(())
    }

    async fn read_reply(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let socket = self.socket()?;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
            Err(_) => {
                debug!("No datagram within {:?}", timeout);
                Ok(Vec::new())
            }
            Ok(Err(e)) => Err(TransportError::Read(e.to_string()).into()),
            Ok(Ok(n)) => {
                buf.truncate(n);
                debug!("<< {}", hex(&buf));
                Ok(buf)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            info!("UDP link to {} closed", self.peer);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("udp {}", self.peer)
    }
}
