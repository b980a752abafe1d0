//! UDP transport.
//!
//! Three shapes, matching the device strings:
//!
//! - remote only: bind an ephemeral port and connect to the peer
//! - local only: bind the port and connect to whoever sends first; the
//!   engine holds its first request until that happens
//! - local and remote: bind the port and connect to the peer, for bridges
//!   that only answer from and to fixed ports

use std::io::{self, Read, Write};
use std::net::UdpSocket;
use std::time::Duration;

use tracing::{debug, info};

use super::Transport;
use crate::device::{Endpoint, TransportKind};
use crate::error::LinkError;

/// UDP socket carrying one MSP stream.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind and optionally connect.
    pub fn bind(
        local: Option<&Endpoint>,
        remote: Option<&Endpoint>,
        read_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let bind_addr = match local {
            Some(endpoint) => endpoint.socket_addr_string(),
            None => "0.0.0.0:0".to_string(),
        };
        if local.is_none() && remote.is_none() {
            return Err(LinkError::InvalidAddress(
                "udp device needs a local port or a peer".into(),
            ));
        }

        let socket = UdpSocket::bind(&bind_addr)?;
        socket.set_read_timeout(Some(read_timeout))?;
        if let Some(remote) = remote {
            socket.connect(remote.socket_addr_string())?;
            debug!(local = %bind_addr, peer = %remote, "udp connected");
        } else {
            debug!(local = %bind_addr, "udp waiting for peer");
        }
        Ok(Self { socket })
    }

    fn has_peer(&self) -> bool {
        self.socket.peer_addr().is_ok()
    }
}

impl Read for UdpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = if self.has_peer() {
                self.socket.recv(buf)?
            } else {
                let (n, peer) = self.socket.recv_from(buf)?;
                // Connecting applies to every clone of the socket, so the
                // writing side can now send to the learned peer.
                self.socket.connect(peer)?;
                info!(%peer, "udp peer learned");
                n
            };
            // Empty datagrams carry nothing and must not look like EOF.
            if n > 0 {
                return Ok(n);
            }
        }
    }
}

impl Write for UdpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.has_peer() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "udp peer not yet known",
            ));
        }
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn close(&mut self) -> io::Result<()> {
        // Nothing to shut down; the receiver wakes on its read timeout.
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(UdpTransport {
            socket: self.socket.try_clone()?,
        }))
    }

    fn is_ready(&self) -> bool {
        self.has_peer()
    }
}
