//! Typed payloads for the identification and waypoint-info replies.
//!
//! Each type decodes from a reply payload and encodes back to one, so that a
//! simulated flight controller can answer with the same layouts.

use bytes::BufMut;

use crate::error::ProtocolError;

fn check_len(what: &'static str, data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::PayloadTooShort {
            what,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decode a NUL-padded ASCII field.
fn decode_str(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

/// `MSP_API_VERSION` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiVersion {
    /// MSP protocol version.
    pub protocol: u8,
    /// API major version; 2 and above speak the extended dialect.
    pub major: u8,
    /// API minor version.
    pub minor: u8,
}

impl ApiVersion {
    /// Decode from a reply payload.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("API_VERSION", data, 3)?;
        Ok(Self {
            protocol: data[0],
            major: data[1],
            minor: data[2],
        })
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        vec![self.protocol, self.major, self.minor]
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `MSP_FC_VARIANT` reply, a four character identifier such as `INAV`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FcVariant(pub String);

impl FcVariant {
    /// Decode from a reply payload.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("FC_VARIANT", data, 4)?;
        Ok(Self(decode_str(&data[..4])))
    }

    /// Encode as a reply payload, padded or truncated to four bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = [0u8; 4];
        for (dst, src) in buf.iter_mut().zip(self.0.bytes()) {
            *dst = src;
        }
        buf.to_vec()
    }
}

/// `MSP_FC_VERSION` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FcVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FcVersion {
    /// Decode from a reply payload.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("FC_VERSION", data, 3)?;
        Ok(Self {
            major: data[0],
            minor: data[1],
            patch: data[2],
        })
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        vec![self.major, self.minor, self.patch]
    }
}

impl std::fmt::Display for FcVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// `MSP_BUILD_INFO` reply.
///
/// Layout: build date (11 bytes, `Mmm dd yyyy`), build time (8 bytes,
/// `hh:mm:ss`), then the short git revision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildInfo {
    pub date: String,
    pub time: String,
    pub git_revision: String,
}

impl BuildInfo {
    const DATE_LEN: usize = 11;
    const TIME_LEN: usize = 8;
    const REVISION_OFFSET: usize = Self::DATE_LEN + Self::TIME_LEN;

    /// Decode from a reply payload.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("BUILD_INFO", data, Self::REVISION_OFFSET)?;
        Ok(Self {
            date: decode_str(&data[..Self::DATE_LEN]),
            time: decode_str(&data[Self::DATE_LEN..Self::REVISION_OFFSET]),
            git_revision: decode_str(&data[Self::REVISION_OFFSET..]),
        })
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::REVISION_OFFSET + self.git_revision.len());
        let mut date = [b' '; Self::DATE_LEN];
        for (dst, src) in date.iter_mut().zip(self.date.bytes()) {
            *dst = src;
        }
        let mut time = [b' '; Self::TIME_LEN];
        for (dst, src) in time.iter_mut().zip(self.time.bytes()) {
            *dst = src;
        }
        buf.extend_from_slice(&date);
        buf.extend_from_slice(&time);
        buf.extend_from_slice(self.git_revision.as_bytes());
        buf
    }
}

/// `MSP_BOARD_INFO` reply.
///
/// Older firmware only sends the 4-character board identifier. Newer firmware
/// follows it with hardware revision, OSD and comms capability bytes, a name
/// length and the full target name starting at offset 9.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardInfo {
    /// Short board identifier.
    pub identifier: String,
    /// Hardware revision (0 when not reported).
    pub hardware_revision: u16,
    /// Full target name, when reported.
    pub name: Option<String>,
}

impl BoardInfo {
    const NAME_OFFSET: usize = 9;

    /// Decode from a reply payload.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("BOARD_INFO", data, 4)?;
        let identifier = decode_str(&data[..4]);
        if data.len() > Self::NAME_OFFSET - 1 {
            let hardware_revision = if data.len() >= 6 {
                u16::from_le_bytes([data[4], data[5]])
            } else {
                0
            };
            let name = data
                .get(Self::NAME_OFFSET..)
                .map(decode_str)
                .filter(|n| !n.is_empty());
            Ok(Self {
                identifier,
                hardware_revision,
                name,
            })
        } else {
            Ok(Self {
                identifier,
                hardware_revision: 0,
                name: None,
            })
        }
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::NAME_OFFSET + 32);
        let mut id = [0u8; 4];
        for (dst, src) in id.iter_mut().zip(self.identifier.bytes()) {
            *dst = src;
        }
        buf.extend_from_slice(&id);
        if let Some(name) = &self.name {
            buf.put_u16_le(self.hardware_revision);
            buf.put_u8(0); // OSD support
            buf.put_u8(0); // comms capabilities
            buf.put_u8(name.len() as u8);
            buf.extend_from_slice(name.as_bytes());
        }
        buf
    }

    /// Name to display: the full target name when known.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}

/// `MSP_NAME` reply. Empty when no craft name is configured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CraftName(pub String);

impl CraftName {
    /// Decode from a reply payload. Never fails.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self(decode_str(data)))
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

/// `MSP_WP_GETINFO` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WpInfo {
    /// Maximum number of waypoints the firmware can hold.
    pub max: u8,
    /// Whether the firmware considers the stored mission valid.
    pub valid: bool,
    /// Number of waypoints currently held.
    pub count: u8,
}

impl WpInfo {
    /// Decode from a reply payload: `[reserved, max, valid, count]`.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        check_len("WP_GETINFO", data, 4)?;
        Ok(Self {
            max: data[1],
            valid: data[2] != 0,
            count: data[3],
        })
    }

    /// Encode as a reply payload.
    pub fn encode(&self) -> Vec<u8> {
        vec![0, self.max, self.valid as u8, self.count]
    }
}

impl std::fmt::Display for WpInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {}, valid {}",
            self.count, self.max, self.valid as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_decode() {
        let api = ApiVersion::decode(&[0, 2, 5]).unwrap();
        assert_eq!(api.major, 2);
        assert_eq!(api.minor, 5);
        assert_eq!(api.to_string(), "2.5");
    }

    #[test]
    fn test_api_version_too_short() {
        assert_eq!(
            ApiVersion::decode(&[0, 2]),
            Err(ProtocolError::PayloadTooShort {
                what: "API_VERSION",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_fc_variant_and_version() {
        assert_eq!(FcVariant::decode(b"INAV").unwrap().0, "INAV");
        assert!(FcVariant::decode(b"IN").is_err());
        assert_eq!(FcVariant("INAV".into()).encode(), b"INAV".to_vec());

        let version = FcVersion::decode(&[7, 1, 2]).unwrap();
        assert_eq!(version.to_string(), "7.1.2");
    }

    #[test]
    fn test_build_info_revision_offset() {
        let mut data = b"Mar 14 2024".to_vec();
        data.extend_from_slice(b"10:20:30");
        data.extend_from_slice(b"a1b2c3d");

        let info = BuildInfo::decode(&data).unwrap();
        assert_eq!(info.date, "Mar 14 2024");
        assert_eq!(info.time, "10:20:30");
        assert_eq!(info.git_revision, "a1b2c3d");
        assert_eq!(info.encode(), data);
    }

    #[test]
    fn test_board_info_short_and_long() {
        let short = BoardInfo::decode(b"SITL").unwrap();
        assert_eq!(short.display_name(), "SITL");
        assert_eq!(short.name, None);

        let long = BoardInfo {
            identifier: "MKF4".into(),
            hardware_revision: 0,
            name: Some("MATEKF405".into()),
        };
        let encoded = long.encode();
        assert_eq!(&encoded[9..], b"MATEKF405");

        let decoded = BoardInfo::decode(&encoded).unwrap();
        assert_eq!(decoded.display_name(), "MATEKF405");
        assert_eq!(decoded.identifier, "MKF4");
    }

    #[test]
    fn test_wp_info() {
        let info = WpInfo::decode(&[0, 120, 1, 7]).unwrap();
        assert_eq!(info.max, 120);
        assert!(info.valid);
        assert_eq!(info.count, 7);
        assert_eq!(info.to_string(), "7 of 120, valid 1");
        assert_eq!(info.encode(), vec![0, 120, 1, 7]);
        assert!(WpInfo::decode(&[0, 120, 1]).is_err());
    }

    #[test]
    fn test_craft_name_strips_padding() {
        assert_eq!(CraftName::decode(b"quad\0\0").unwrap().0, "quad");
        assert_eq!(CraftName::decode(&[]).unwrap().0, "");
    }
}
