//! Error types for the link crate.

use impload_mission::{MissionError, ValidationError};
use msp_protocol::ProtocolError;
use thiserror::Error;

/// Errors that end a link session.
///
/// There is no retry or reconnect: every variant is fatal to the run and is
/// handed back to the caller to report.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Transport not available on this platform.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Device address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No reply to a request within the engine timeout.
    #[error("timed out waiting for reply to command {command}")]
    Timeout {
        /// Command that went unanswered.
        command: u16,
    },

    /// A listening transport heard from no peer in time.
    #[error("no peer heard from within {0:?}")]
    NoPeer(std::time::Duration),

    /// Mission has more items than one-byte waypoint numbers can address.
    #[error("mission has {count} items; waypoint numbers stop at 255")]
    TooManyItems {
        /// Items after flattening.
        count: usize,
    },

    /// Frame receiver stopped (read error or end of stream).
    #[error("connection closed: {0}")]
    Disconnected(String),

    /// Flight controller answered with an error reply.
    #[error("flight controller rejected command {command}")]
    Rejected {
        /// Rejected command.
        command: u16,
    },

    /// Frame or payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Waypoint record could not be decoded.
    #[error("mission error: {0}")]
    Mission(#[from] MissionError),

    /// Mission failed validation; nothing was sent.
    #[error("mission fails verification: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}
