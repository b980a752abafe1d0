//! TCP client transport.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use super::Transport;
use crate::device::{Endpoint, TransportKind};
use crate::error::LinkError;

/// TCP connection to a flight controller or serial bridge.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `endpoint`.
    pub fn connect(endpoint: &Endpoint, read_timeout: Duration) -> Result<Self, LinkError> {
        if endpoint.host.is_empty() {
            return Err(LinkError::InvalidAddress(format!(
                "tcp device needs a host: {}",
                endpoint
            )));
        }
        let stream = TcpStream::connect(endpoint.socket_addr_string())?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        debug!(peer = ?stream.peer_addr().ok(), "tcp connected");
        Ok(Self { stream })
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport {
            stream: self.stream.try_clone()?,
        }))
    }
}
