//! Connection handshake.
//!
//! Identifies the firmware, picks the wire dialect from the API version and
//! learns the waypoint capacity. Identification replies that do not decode
//! are logged and left blank; only transport failures end the handshake.

use msp_protocol::{
    ApiVersion, BoardInfo, BuildInfo, CraftName, Dialect, FcVariant, FcVersion, ProtocolError,
    WpInfo, MSP_API_VERSION, MSP_BOARD_INFO, MSP_BUILD_INFO, MSP_FC_VARIANT, MSP_FC_VERSION,
    MSP_NAME,
};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::LinkError;

/// What the flight controller told us about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FcInfo {
    pub api: Option<ApiVersion>,
    pub variant: Option<FcVariant>,
    pub version: Option<FcVersion>,
    pub build: Option<BuildInfo>,
    pub board: Option<BoardInfo>,
    pub name: Option<CraftName>,
    /// Waypoint summary from the last WP_GETINFO.
    pub waypoints: Option<WpInfo>,
}

impl std::fmt::Display for FcInfo {
    /// One-line summary, e.g. `INAV v7.1.0 SITL (a1b2c3d) API 2.5 "quad"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = self.variant.as_ref().map(|v| v.0.as_str()).unwrap_or("");
        let version = self.version.map(|v| v.to_string()).unwrap_or_default();
        let board = self.board.as_ref().map(|b| b.display_name()).unwrap_or("");
        let gitrev = self.build.as_ref().map(|b| b.git_revision.as_str()).unwrap_or("");
        let api = self.api.map(|a| a.to_string()).unwrap_or_default();
        write!(f, "{} v{} {} ({}) API {}", variant, version, board, gitrev, api)?;
        match &self.name {
            Some(name) if !name.0.is_empty() => write!(f, " \"{}\"", name.0),
            _ => Ok(()),
        }
    }
}

impl Engine {
    /// Run the handshake.
    ///
    /// With `restore`, the stored mission is loaded into the flight
    /// controller's working set before the waypoint summary is taken, so a
    /// following download fetches the stored mission.
    pub fn handshake(&mut self, restore: bool) -> Result<&FcInfo, LinkError> {
        let api = self.identify(MSP_API_VERSION, ApiVersion::decode)?;
        match api {
            Some(api) => {
                self.dialect = Dialect::for_api_major(api.major);
                debug!(%api, dialect = %self.dialect, "api version");
            }
            None => warn!("no usable API version; staying with {}", self.dialect),
        }
        self.info.api = api;

        self.info.variant = self.identify(MSP_FC_VARIANT, FcVariant::decode)?;
        self.info.version = self.identify(MSP_FC_VERSION, FcVersion::decode)?;
        self.info.build = self.identify(MSP_BUILD_INFO, BuildInfo::decode)?;
        self.info.board = self.identify(MSP_BOARD_INFO, BoardInfo::decode)?;
        self.info.name = self.identify(MSP_NAME, CraftName::decode)?;
        info!("{}", self.info);

        if restore {
            self.load_mission()?;
        }

        let wp = self.wp_info()?;
        if wp.max > 0 {
            self.capacity = wp.max as usize;
        }
        info!("Extant waypoints in FC: {}", wp);
        Ok(&self.info)
    }

    /// Request an identification field; a rejected or undecodable reply is
    /// logged and yields `None`.
    fn identify<T>(
        &mut self,
        command: u16,
        decode: fn(&[u8]) -> Result<T, ProtocolError>,
    ) -> Result<Option<T>, LinkError> {
        let frame = self.request(command, &[])?;
        if frame.is_error() {
            warn!(command, "identification request rejected");
            return Ok(None);
        }
        match decode(&frame.payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(command, error = %e, "could not decode identification reply");
                Ok(None)
            }
        }
    }
}
