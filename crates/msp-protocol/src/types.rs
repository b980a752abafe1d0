//! Core protocol types.

use crate::constants::*;
use crate::error::ProtocolError;

/// Wire dialect used to frame a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// MSPv1: single-byte length and command, XOR checksum.
    #[default]
    V1,
    /// MSPv2: 16-bit length and command, CRC-8/DVB-S2 checksum.
    V2,
}

impl Dialect {
    /// Select the dialect for an API major version reported by the firmware.
    pub fn for_api_major(major: u8) -> Self {
        if major >= 2 {
            Dialect::V2
        } else {
            Dialect::V1
        }
    }

    /// Dialect to use for `command` when this dialect was negotiated.
    ///
    /// Command ids above 255 only exist in the extended dialect.
    pub fn for_command(self, command: u16) -> Self {
        if command > V1_MAX_COMMAND {
            Dialect::V2
        } else {
            self
        }
    }

    /// Largest payload this dialect can frame.
    pub fn max_payload(self) -> usize {
        match self {
            Dialect::V1 => V1_MAX_PAYLOAD,
            Dialect::V2 => V2_MAX_PAYLOAD,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::V1 => write!(f, "MSPv1"),
            Dialect::V2 => write!(f, "MSPv2"),
        }
    }
}

/// Direction of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host → flight controller (`<`).
    Request,
    /// Flight controller → host, success (`>`).
    Response,
    /// Flight controller → host, command rejected (`!`).
    Error,
}

impl Direction {
    /// Parse a direction byte.
    pub fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        match value {
            DIR_REQUEST => Ok(Direction::Request),
            DIR_RESPONSE => Ok(Direction::Response),
            DIR_ERROR => Ok(Direction::Error),
            other => Err(ProtocolError::InvalidDirection(other)),
        }
    }
}

impl From<Direction> for u8 {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Request => DIR_REQUEST,
            Direction::Response => DIR_RESPONSE,
            Direction::Error => DIR_ERROR,
        }
    }
}

/// One complete protocol message as produced by the [`Decoder`](crate::Decoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Dialect the frame arrived in.
    pub dialect: Dialect,
    /// Frame direction.
    pub direction: Direction,
    /// Command id.
    pub command: u16,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Whether the trailing checksum matched. The decoder only ever delivers
    /// frames with this set.
    pub valid: bool,
}

impl Frame {
    /// Whether the flight controller rejected the command.
    pub fn is_error(&self) -> bool {
        self.direction == Direction::Error
    }
}
