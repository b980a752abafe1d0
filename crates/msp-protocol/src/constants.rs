//! Protocol constants
//!
//! Command codes, framing bytes, and size limits used by the MSP
//! (MultiWii Serial Protocol) request/response protocol spoken by
//! INAV-family flight controllers.

// ============================================================================
// Framing
// ============================================================================

/// First preamble byte of every frame (`$`).
pub const PREAMBLE: u8 = b'$';
/// Second preamble byte of a legacy (v1) frame (`M`).
pub const PREAMBLE_V1: u8 = b'M';
/// Second preamble byte of an extended (v2) frame (`X`).
pub const PREAMBLE_V2: u8 = b'X';

/// Direction byte for host → flight controller requests (`<`).
pub const DIR_REQUEST: u8 = b'<';
/// Direction byte for successful flight controller replies (`>`).
pub const DIR_RESPONSE: u8 = b'>';
/// Direction byte for error replies (`!`).
pub const DIR_ERROR: u8 = b'!';

/// Bytes in a legacy frame that are not payload: `$ M dir len cmd .. crc`.
pub const V1_OVERHEAD: usize = 6;
/// Bytes in an extended frame that are not payload:
/// `$ X dir flags cmd_lo cmd_hi len_lo len_hi .. crc`.
pub const V2_OVERHEAD: usize = 9;

/// Largest payload a legacy frame can carry.
pub const V1_MAX_PAYLOAD: usize = u8::MAX as usize;
/// Largest payload an extended frame can carry.
pub const V2_MAX_PAYLOAD: usize = u16::MAX as usize;

/// Highest command id that fits the legacy single-byte command field.
pub const V1_MAX_COMMAND: u16 = u8::MAX as u16;

// ============================================================================
// Command Codes (identification)
// ============================================================================

/// API version: `[protocol, major, minor]`.
pub const MSP_API_VERSION: u16 = 1;
/// Flight controller variant, four ASCII characters (e.g. `INAV`).
pub const MSP_FC_VARIANT: u16 = 2;
/// Firmware version: `[major, minor, patch]`.
pub const MSP_FC_VERSION: u16 = 3;
/// Board identifier and (on newer firmware) board name.
pub const MSP_BOARD_INFO: u16 = 4;
/// Build date, time and git revision.
pub const MSP_BUILD_INFO: u16 = 5;
/// Craft name.
pub const MSP_NAME: u16 = 10;

// ============================================================================
// Command Codes (waypoints)
// ============================================================================

/// Restore the waypoint mission from persistent storage.
pub const MSP_WP_MISSION_LOAD: u16 = 18;
/// Save the waypoint mission to persistent storage.
pub const MSP_WP_MISSION_SAVE: u16 = 19;
/// Waypoint capabilities: `[reserved, max, valid, count]`.
pub const MSP_WP_GETINFO: u16 = 20;
/// Fetch one waypoint by 1-based index.
pub const MSP_WP: u16 = 118;
/// Store one waypoint.
pub const MSP_SET_WP: u16 = 209;
/// Write the full configuration to EEPROM.
pub const MSP_EEPROM_WRITE: u16 = 250;

// ============================================================================
// Command Codes (extended-only)
// ============================================================================

/// Read a named setting: request `name\0`, reply is the raw value.
pub const MSP2_COMMON_SETTING: u16 = 0x1003;
/// Set a named setting: `name\0` followed by the raw value.
pub const MSP2_COMMON_SET_SETTING: u16 = 0x1004;
