//! Frame encoding/decoding utilities.
//!
//! MSP has two wire dialects. Both start with `$`, a dialect byte and a
//! direction byte (`<` request, `>` reply, `!` error reply).
//!
//! ```text
//! Legacy (v1):
//! +---+---+-----+-----+-----+-------------+-----+
//! | $ | M | dir | len | cmd | payload ... | xor |
//! +---+---+-----+-----+-----+-------------+-----+
//!
//! Extended (v2):
//! +---+---+-----+-------+--------+--------+-------------+------+
//! | $ | X | dir | flags | cmd LE | len LE | payload ... | crc8 |
//! +---+---+-----+-------+--------+--------+-------------+------+
//! ```
//!
//! The legacy checksum is the XOR of `len`, `cmd` and the payload. The
//! extended checksum is CRC-8/DVB-S2 over `flags` through the payload.

use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_8_DVB_S2};
use log::{trace, warn};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{Dialect, Direction, Frame};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_DVB_S2);

/// Offset of the first checksummed byte (`len` in v1, `flags` in v2).
const CHECKSUM_START: usize = 3;
/// Bytes before the payload in a legacy frame.
const V1_HEADER_LEN: usize = 5;
/// Bytes before the payload in an extended frame.
const V2_HEADER_LEN: usize = 8;

/// CRC-8/DVB-S2 (polynomial 0xD5) as used by MSPv2.
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

/// Running XOR checksum as used by MSPv1.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Stateless frame encoder.
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a host → flight controller request.
    pub fn encode(dialect: Dialect, command: u16, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Self::encode_frame(dialect, Direction::Request, command, payload)
    }

    /// Encode a frame with an explicit direction.
    pub fn encode_frame(
        dialect: Dialect,
        direction: Direction,
        command: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        if payload.len() > dialect.max_payload() {
            return Err(ProtocolError::PayloadTooLong {
                dialect,
                max: dialect.max_payload(),
                actual: payload.len(),
            });
        }

        match dialect {
            Dialect::V1 => {
                if command > V1_MAX_COMMAND {
                    return Err(ProtocolError::CommandOutOfRange(command));
                }
                let mut buf = Vec::with_capacity(V1_OVERHEAD + payload.len());
                buf.put_u8(PREAMBLE);
                buf.put_u8(PREAMBLE_V1);
                buf.put_u8(direction.into());
                buf.put_u8(payload.len() as u8);
                buf.put_u8(command as u8);
                buf.extend_from_slice(payload);
                let checksum = xor_checksum(&buf[CHECKSUM_START..]);
                buf.put_u8(checksum);
                Ok(buf)
            }
            Dialect::V2 => {
                let mut buf = Vec::with_capacity(V2_OVERHEAD + payload.len());
                buf.put_u8(PREAMBLE);
                buf.put_u8(PREAMBLE_V2);
                buf.put_u8(direction.into());
                buf.put_u8(0); // flags
                buf.put_u16_le(command);
                buf.put_u16_le(payload.len() as u16);
                buf.extend_from_slice(payload);
                let checksum = crc8_dvb_s2(&buf[CHECKSUM_START..]);
                buf.put_u8(checksum);
                Ok(buf)
            }
        }
    }
}

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    /// Waiting for `$`.
    #[default]
    Init,
    /// Got `$`, waiting for `M` or `X`.
    Sync,
    Direction,
    V1Length,
    V1Command,
    V2Flags,
    V2CommandLo,
    V2CommandHi,
    V2LengthLo,
    V2LengthHi,
    Data,
    Checksum,
}

/// Byte-at-a-time MSP decoder for both dialects.
///
/// Every byte of the frame in progress is kept, starting from its `$`. When a
/// frame attempt fails (an unexpected header byte or a checksum mismatch) the
/// bytes after that `$` are fed through the state machine again, so a frame
/// that started inside a corrupted one is still found.
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    dialect: Dialect,
    direction: Option<Direction>,
    command: u16,
    length: usize,
    received: usize,
    /// Raw bytes of the frame in progress, including the leading `$`.
    raw: BytesMut,
    /// Bytes waiting to be (re)processed.
    replay: VecDeque<u8>,
    frames_decoded: u64,
    checksum_errors: u64,
}

impl Decoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, returning every frame they complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in data {
            self.replay.push_back(byte);
            while let Some(b) = self.replay.pop_front() {
                if let Some(frame) = self.step(b) {
                    frames.push(frame);
                }
            }
        }
        frames
    }

    /// Number of frames delivered so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Number of frames dropped because of a checksum mismatch.
    pub fn checksum_errors(&self) -> u64 {
        self.checksum_errors
    }

    /// Whether the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == State::Init
    }

    fn step(&mut self, byte: u8) -> Option<Frame> {
        if self.state != State::Init {
            self.raw.put_u8(byte);
        }

        match self.state {
            State::Init => {
                if byte == PREAMBLE {
                    self.raw.clear();
                    self.raw.put_u8(byte);
                    self.state = State::Sync;
                }
            }
            State::Sync => match byte {
                PREAMBLE_V1 => {
                    self.dialect = Dialect::V1;
                    self.state = State::Direction;
                }
                PREAMBLE_V2 => {
                    self.dialect = Dialect::V2;
                    self.state = State::Direction;
                }
                _ => self.resync(),
            },
            State::Direction => match Direction::from_byte(byte) {
                Ok(direction) => {
                    self.direction = Some(direction);
                    self.state = match self.dialect {
                        Dialect::V1 => State::V1Length,
                        Dialect::V2 => State::V2Flags,
                    };
                }
                Err(_) => self.resync(),
            },
            State::V1Length => {
                self.length = byte as usize;
                self.state = State::V1Command;
            }
            State::V1Command => {
                self.command = byte as u16;
                self.start_payload();
            }
            State::V2Flags => {
                self.state = State::V2CommandLo;
            }
            State::V2CommandLo => {
                self.command = byte as u16;
                self.state = State::V2CommandHi;
            }
            State::V2CommandHi => {
                self.command |= (byte as u16) << 8;
                self.state = State::V2LengthLo;
            }
            State::V2LengthLo => {
                self.length = byte as usize;
                self.state = State::V2LengthHi;
            }
            State::V2LengthHi => {
                self.length |= (byte as usize) << 8;
                self.start_payload();
            }
            State::Data => {
                self.received += 1;
                if self.received == self.length {
                    self.state = State::Checksum;
                }
            }
            State::Checksum => return self.finish(byte),
        }
        None
    }

    fn start_payload(&mut self) {
        self.received = 0;
        self.state = if self.length == 0 {
            State::Checksum
        } else {
            State::Data
        };
    }

    fn finish(&mut self, received: u8) -> Option<Frame> {
        let span = &self.raw[CHECKSUM_START..self.raw.len() - 1];
        let expected = match self.dialect {
            Dialect::V1 => xor_checksum(span),
            Dialect::V2 => crc8_dvb_s2(span),
        };

        if expected != received {
            self.checksum_errors += 1;
            warn!(
                "{} checksum error on command {} (computed 0x{:02X}, received 0x{:02X})",
                self.dialect, self.command, expected, received
            );
            self.resync();
            return None;
        }

        let header_len = match self.dialect {
            Dialect::V1 => V1_HEADER_LEN,
            Dialect::V2 => V2_HEADER_LEN,
        };
        let payload = self.raw[header_len..header_len + self.length].to_vec();
        let direction = self.direction.take()?;

        self.raw.clear();
        self.state = State::Init;
        self.frames_decoded += 1;

        Some(Frame {
            dialect: self.dialect,
            direction,
            command: self.command,
            payload,
            valid: true,
        })
    }

    /// Abandon the frame in progress and rescan everything after its `$`.
    fn resync(&mut self) {
        trace!("resync after {} bytes", self.raw.len());
        for &b in self.raw[1..].iter().rev() {
            self.replay.push_front(b);
        }
        self.raw.clear();
        self.direction = None;
        self.state = State::Init;
    }
}

/// Decode the first complete frame in `data`.
pub fn decode(data: &[u8]) -> Option<Frame> {
    Decoder::new().feed(data).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        // 0x24 is '$'; keep it out of payloads so corrupted frames cannot
        // start spurious frames of their own.
        (0..len).map(|i| 0x40 + (i % 0x30) as u8).collect()
    }

    #[test]
    fn test_encode_api_version_legacy() {
        let encoded = FrameCodec::encode(Dialect::V1, MSP_API_VERSION, &[]).unwrap();
        assert_eq!(encoded, vec![0x24, 0x4D, 0x3C, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_encode_extended_layout() {
        let encoded =
            FrameCodec::encode(Dialect::V2, MSP2_COMMON_SET_SETTING, &[0xAA, 0xBB]).unwrap();
        assert_eq!(&encoded[..3], b"$X<");
        assert_eq!(encoded[3], 0); // flags
        assert_eq!(&encoded[4..6], &[0x04, 0x10]);
        assert_eq!(&encoded[6..8], &[0x02, 0x00]);
        assert_eq!(&encoded[8..10], &[0xAA, 0xBB]);
        assert_eq!(encoded[10], crc8_dvb_s2(&encoded[3..10]));
    }

    #[test]
    fn test_crc8_dvb_s2_check_value() {
        assert_eq!(crc8_dvb_s2(b"123456789"), 0xBC);
        assert_eq!(crc8_dvb_s2(&[]), 0x00);
    }

    #[test]
    fn test_legacy_roundtrip() {
        for len in [0usize, 1, 2, 21, 127, 254, 255] {
            for command in [MSP_API_VERSION, MSP_WP, MSP_SET_WP, 255] {
                let payload = pattern(len);
                let encoded = FrameCodec::encode(Dialect::V1, command, &payload).unwrap();
                assert_eq!(encoded.len(), V1_OVERHEAD + len);

                let frame = decode(&encoded).expect("should decode frame");
                assert_eq!(frame.command, command);
                assert_eq!(frame.payload, payload);
                assert_eq!(frame.dialect, Dialect::V1);
                assert_eq!(frame.direction, Direction::Request);
                assert!(frame.valid);
            }
        }
    }

    #[test]
    fn test_extended_roundtrip() {
        for len in [0usize, 1, 255, 256, 1000, 65535] {
            for command in [MSP_WP_GETINFO, MSP2_COMMON_SET_SETTING, u16::MAX] {
                let payload = pattern(len);
                let encoded = FrameCodec::encode(Dialect::V2, command, &payload).unwrap();
                assert_eq!(encoded.len(), V2_OVERHEAD + len);

                let frame = decode(&encoded).expect("should decode frame");
                assert_eq!(frame.command, command);
                assert_eq!(frame.payload, payload);
                assert_eq!(frame.dialect, Dialect::V2);
            }
        }
    }

    #[test]
    fn test_encode_limits() {
        assert_eq!(
            FrameCodec::encode(Dialect::V1, MSP2_COMMON_SET_SETTING, &[]),
            Err(ProtocolError::CommandOutOfRange(MSP2_COMMON_SET_SETTING))
        );
        assert!(matches!(
            FrameCodec::encode(Dialect::V1, MSP_SET_WP, &[0u8; 256]),
            Err(ProtocolError::PayloadTooLong { max: 255, actual: 256, .. })
        ));
        assert!(FrameCodec::encode(Dialect::V2, MSP_SET_WP, &[0u8; 256]).is_ok());
    }

    #[test]
    fn test_error_direction() {
        let encoded =
            FrameCodec::encode_frame(Dialect::V1, Direction::Error, MSP_SET_WP, &[]).unwrap();
        assert_eq!(encoded[2], b'!');
        let frame = decode(&encoded).unwrap();
        assert!(frame.is_error());
        assert_eq!(frame.command, MSP_SET_WP);
    }

    #[test]
    fn test_partial_feed() {
        let mut decoder = Decoder::new();
        let encoded =
            FrameCodec::encode_frame(Dialect::V2, Direction::Response, MSP_WP, &pattern(21))
                .unwrap();

        assert!(decoder.feed(&encoded[..4]).is_empty());
        assert!(!decoder.is_idle());
        assert!(decoder.feed(&encoded[4..12]).is_empty());

        let frames = decoder.feed(&encoded[12..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, pattern(21));
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut data = Vec::new();
        data.extend(FrameCodec::encode(Dialect::V1, MSP_FC_VARIANT, b"INAV").unwrap());
        data.extend(FrameCodec::encode(Dialect::V2, MSP_FC_VERSION, &[7, 1, 0]).unwrap());
        data.extend(FrameCodec::encode(Dialect::V1, MSP_NAME, &[]).unwrap());

        let frames = Decoder::new().feed(&data);
        let commands: Vec<u16> = frames.iter().map(|f| f.command).collect();
        assert_eq!(commands, vec![MSP_FC_VARIANT, MSP_FC_VERSION, MSP_NAME]);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut data = vec![0x00, b'$', b'$', b'M', b'?', 0xFF, b'$', b'X', b'Q'];
        let good = FrameCodec::encode(Dialect::V1, MSP_WP_GETINFO, &[0, 120, 1, 0]).unwrap();
        data.extend_from_slice(&good);

        let mut decoder = Decoder::new();
        let frames = decoder.feed(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, vec![0, 120, 1, 0]);
        assert_eq!(decoder.checksum_errors(), 0);
    }

    fn assert_corruption_rejected(
        dialect: Dialect,
        masks: &[u8],
        corrupt_from: usize,
        next_payload_len: usize,
    ) {
        let original = FrameCodec::encode_frame(
            dialect,
            Direction::Response,
            MSP_WP_GETINFO,
            &[0x10, 0x20, 0x30, 0x40],
        )
        .unwrap();
        let next_payload = vec![0x5A; next_payload_len];
        let next =
            FrameCodec::encode_frame(dialect, Direction::Response, MSP_NAME, &next_payload)
                .unwrap();

        for position in corrupt_from..original.len() - 1 {
            for &mask in masks {
                let mut corrupted = original.clone();
                corrupted[position] ^= mask;
                corrupted.extend_from_slice(&next);

                let mut decoder = Decoder::new();
                let frames = decoder.feed(&corrupted);
                assert_eq!(
                    frames.len(),
                    1,
                    "position {} mask 0x{:02X}: expected only the trailing frame",
                    position,
                    mask
                );
                assert_eq!(frames[0].command, MSP_NAME);
                assert_eq!(frames[0].payload, next_payload);
                assert_eq!(decoder.checksum_errors(), 1);
            }
        }
    }

    #[test]
    fn test_legacy_checksum_rejection() {
        // Covers the length byte through the last payload byte.
        assert_corruption_rejected(Dialect::V1, &[0x01, 0x80], 3, 200);
    }

    #[test]
    fn test_extended_checksum_rejection() {
        // Covers the flags byte through the last payload byte. Flipping the
        // high length byte grows the frame by up to 512, so the trailing frame
        // must be long enough to complete it.
        assert_corruption_rejected(Dialect::V2, &[0x01, 0x02], 3, 600);
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(Dialect::for_api_major(1), Dialect::V1);
        assert_eq!(Dialect::for_api_major(2), Dialect::V2);
        assert_eq!(Dialect::V1.for_command(MSP_SET_WP), Dialect::V1);
        assert_eq!(Dialect::V1.for_command(MSP2_COMMON_SET_SETTING), Dialect::V2);
        assert_eq!(Dialect::V2.for_command(MSP_SET_WP), Dialect::V2);
    }
}
