//! Fixed 21-byte waypoint record exchanged by `MSP_WP` and `MSP_SET_WP`.
//!
//! ```text
//! seq(u8) action(u8) lat(i32) lon(i32) alt(i32) p1(i16) p2(i16) p3(i16) flag(u8)
//! ```
//!
//! All multi-byte fields are little-endian. Coordinates are degrees × 1e7,
//! altitude is centimetres.

use bytes::{Buf, BufMut};

use crate::error::MissionError;
use crate::types::{Action, MissionItem};

/// Size of one waypoint record.
pub const WP_RECORD_SIZE: usize = 21;

const COORD_SCALE: f64 = 1e7;
const ALT_SCALE: i32 = 100;

/// Serialize an item using its own sequence number and flag.
///
/// The sequence number is one byte. Numbers above 255 wrap, so uploads
/// refuse longer missions before encoding anything.
pub fn encode_record(item: &MissionItem) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WP_RECORD_SIZE);
    buf.put_u8(item.number as u8);
    buf.put_u8(item.action.code());
    buf.put_i32_le((item.lat * COORD_SCALE).round() as i32);
    buf.put_i32_le((item.lon * COORD_SCALE).round() as i32);
    buf.put_i32_le(item.alt.saturating_mul(ALT_SCALE));
    buf.put_i16_le(item.p1);
    buf.put_i16_le(item.p2);
    buf.put_i16_le(item.p3);
    buf.put_u8(item.flag);
    buf
}

/// Deserialize a record.
pub fn decode_record(data: &[u8]) -> Result<MissionItem, MissionError> {
    if data.len() < WP_RECORD_SIZE {
        return Err(MissionError::RecordTooShort {
            expected: WP_RECORD_SIZE,
            actual: data.len(),
        });
    }

    let mut buf = data;
    Ok(MissionItem {
        number: buf.get_u8() as u16,
        action: Action::from_code(buf.get_u8()),
        lat: buf.get_i32_le() as f64 / COORD_SCALE,
        lon: buf.get_i32_le() as f64 / COORD_SCALE,
        alt: buf.get_i32_le() / ALT_SCALE,
        p1: buf.get_i16_le(),
        p2: buf.get_i16_le(),
        p3: buf.get_i16_le(),
        flag: buf.get_u8(),
    })
}
