//! MSP (MultiWii Serial Protocol) framing
//!
//! This crate provides types and utilities for talking to INAV-family flight
//! controllers over MSP. Every message is a framed request from the host
//! followed by a framed reply from the flight controller.
//!
//! # Protocol Overview
//!
//! Two wire dialects share the `$` preamble:
//!
//! - **Legacy** (`$M`): 8-bit command and length, XOR checksum
//! - **Extended** (`$X`): 16-bit command and length, CRC-8/DVB-S2 checksum
//!
//! Firmware reporting API major version 2 or later accepts the extended
//! dialect. Command ids above 255 always require it.
//!
//! # Example
//!
//! ```rust
//! use msp_protocol::{Decoder, Dialect, FrameCodec, MSP_API_VERSION};
//!
//! let request = FrameCodec::encode(Dialect::V1, MSP_API_VERSION, &[]).unwrap();
//! assert_eq!(request, vec![0x24, 0x4D, 0x3C, 0x00, 0x01, 0x01]);
//!
//! let mut decoder = Decoder::new();
//! let frames = decoder.feed(&request);
//! assert_eq!(frames[0].command, MSP_API_VERSION);
//! ```

mod constants;
mod error;
mod frame;
mod responses;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use responses::*;
pub use types::*;
