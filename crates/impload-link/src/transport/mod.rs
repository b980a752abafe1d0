//! Byte-stream transports.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   Engine (writes) / Receiver (reads) │
//! └──────────┬───────────────────────────┘
//!            │ Box<dyn Transport>
//!            ▼
//! ┌──────────┬──────────┬──────────┬─────────────┐
//! │  Serial  │   TCP    │   UDP    │  Bluetooth  │
//! └──────────┴──────────┴──────────┴─────────────┘
//! ```
//!
//! Transports know nothing about MSP. The engine keeps the handle returned
//! by [`open`] for writing and gives a [`Transport::try_clone`] of it to the
//! frame receiver thread for reading.
//!
//! Reads must return within the configured read timeout, reporting
//! `TimedOut` or `WouldBlock` when nothing arrived, so the receiver can
//! observe shutdown. `Ok(0)` means the stream has ended.

mod bluetooth;
mod serial;
mod tcp;
mod udp;

use std::io::{self, Read, Write};

use tracing::info;

use crate::config::LinkConfig;
use crate::device::{DeviceDescriptor, TransportKind};
use crate::error::LinkError;

pub use bluetooth::BluetoothTransport;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// A bidirectional byte stream to the flight controller.
pub trait Transport: Read + Write + Send {
    /// Transport family.
    fn kind(&self) -> TransportKind;

    /// Shut the connection down. Blocked readers on clones should wake.
    fn close(&mut self) -> io::Result<()>;

    /// Another handle to the same connection.
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;

    /// Whether writes have somewhere to go. Only a UDP socket still waiting
    /// for its first datagram answers no.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Open the transport described by `device`.
pub fn open(device: &DeviceDescriptor, config: &LinkConfig) -> Result<Box<dyn Transport>, LinkError> {
    let read_timeout = config.read_timeout();
    let transport: Box<dyn Transport> = match device {
        DeviceDescriptor::Serial { path, baud } => {
            Box::new(SerialTransport::open(path, *baud, read_timeout)?)
        }
        DeviceDescriptor::Tcp(endpoint) => Box::new(TcpTransport::connect(endpoint, read_timeout)?),
        DeviceDescriptor::Udp { local, remote } => Box::new(UdpTransport::bind(
            local.as_ref(),
            remote.as_ref(),
            read_timeout,
        )?),
        DeviceDescriptor::Bluetooth { address } => Box::new(BluetoothTransport::connect(
            address,
            config.bluetooth_channel,
            read_timeout,
        )?),
    };
    info!(device = %device, kind = %transport.kind(), "transport open");
    Ok(transport)
}

/// Whether a read error only means "nothing yet".
pub(crate) fn is_idle_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
