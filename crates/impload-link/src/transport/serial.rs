//! Serial port transport.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use super::Transport;
use crate::device::TransportKind;
use crate::error::LinkError;

/// Serial port at a fixed baud rate.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud`, discarding anything already buffered.
    pub fn open(path: &str, baud: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud).timeout(read_timeout).open()?;
        port.clear(ClearBuffer::All)?;
        debug!(path, baud, "serial port open");
        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "serial port closed");
        }
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))?
            .try_clone()
            .map_err(io::Error::from)?;
        Ok(Box::new(SerialTransport {
            port: Some(port),
            path: self.path.clone(),
        }))
    }
}
