//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with MSP frames and payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is too short to decode the expected structure.
    #[error("payload too short for {what}: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Structure being decoded.
        what: &'static str,
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Payload does not fit the selected dialect's length field.
    #[error("payload too long for {dialect} framing: maximum {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Dialect that was asked to carry the payload.
        dialect: crate::Dialect,
        /// Maximum allowed length.
        max: usize,
        /// Actual length requested.
        actual: usize,
    },

    /// Command id does not fit the legacy single-byte command field.
    #[error("command {0} cannot be carried by legacy framing")]
    CommandOutOfRange(u16),

    /// Unknown direction byte.
    #[error("invalid direction byte: 0x{0:02X}")]
    InvalidDirection(u8),
}
