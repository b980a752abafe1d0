//! Mission download and upload.

use impload_mission::{
    decode_record, encode_record, flatten, resolve_home, split, update_center, MissionItem,
    MultiMission, ValidationError,
};
use msp_protocol::{
    WpInfo, MSP_SET_WP, MSP_WP, MSP_WP_GETINFO, MSP_WP_MISSION_LOAD, MSP_WP_MISSION_SAVE,
};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::LinkError;
use crate::telemetry::metric_defs;

/// Payload for WP_MISSION_LOAD and WP_MISSION_SAVE.
const MISSION_STORE: [u8; 1] = [1];

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Items written with SET_WP.
    pub sent: usize,
    /// 1-based numbers of items the flight controller rejected.
    pub rejected: Vec<u16>,
    /// Whether the mission was saved to persistent storage.
    pub saved: bool,
    /// Waypoint summary read back after the upload.
    pub device: WpInfo,
}

/// A downloaded mission and the validation problems found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub mission: MultiMission,
    /// Logged as warnings; a downloaded mission is kept either way.
    pub problems: Vec<ValidationError>,
}

/// Largest waypoint number a one-byte sequence field can carry.
const MAX_WAYPOINT_NUMBER: usize = u8::MAX as usize;

impl Engine {
    /// Read the flight controller's waypoint summary.
    pub fn wp_info(&mut self) -> Result<WpInfo, LinkError> {
        let frame = self.request_ok(MSP_WP_GETINFO, &[])?;
        let wp = WpInfo::decode(&frame.payload)?;
        self.info.waypoints = Some(wp);
        Ok(wp)
    }

    /// Restore the mission from persistent storage into the working set.
    pub fn load_mission(&mut self) -> Result<(), LinkError> {
        self.request_ok(MSP_WP_MISSION_LOAD, &MISSION_STORE)?;
        self.restored = true;
        info!("Restored mission");
        Ok(())
    }

    /// Save the working mission to persistent storage.
    ///
    /// Returns `false` if the flight controller refused, which it does for
    /// missions it considers invalid.
    pub fn save_mission(&mut self) -> Result<bool, LinkError> {
        let frame = self.request(MSP_WP_MISSION_SAVE, &MISSION_STORE)?;
        if frame.is_error() {
            warn!("flight controller refused to save the mission");
            return Ok(false);
        }
        info!("Saved mission");
        Ok(true)
    }

    /// Fetch the mission held by the flight controller.
    ///
    /// With `from_store` the stored mission is restored first, unless the
    /// handshake already did so.
    pub fn download(&mut self, from_store: bool) -> Result<MultiMission, LinkError> {
        Ok(self.download_report(from_store)?.mission)
    }

    /// Like [`download`](Self::download), also returning what the validator
    /// made of the mission.
    pub fn download_report(&mut self, from_store: bool) -> Result<DownloadReport, LinkError> {
        if from_store && !self.restored {
            self.load_mission()?;
        }

        let count = self.wp_info()?.count as u16;
        let mut items = Vec::with_capacity(count as usize);
        for index in 1..=count {
            let frame = self.request(MSP_WP, &[index as u8])?;
            if frame.is_error() {
                return Err(LinkError::Rejected { command: MSP_WP });
            }
            let item = decode_record(&frame.payload)?;
            debug!(index, action = %item.action, "waypoint received");
            items.push(item);
        }

        let mut segments = split(items);
        for segment in &mut segments {
            resolve_home(segment);
            update_center(segment);
        }
        info!(
            items = count,
            segments = segments.len(),
            "mission downloaded"
        );
        let mission = MultiMission::new(segments);
        let problems = self.config.validator(self.capacity).report(&mission);
        Ok(DownloadReport { mission, problems })
    }

    /// Validate and write `mission` to the flight controller.
    ///
    /// Validation runs before any I/O; a failing mission is never partially
    /// written. Items the flight controller rejects are logged and the upload
    /// carries on with the rest.
    pub fn upload(&mut self, mission: &MultiMission, persist: bool) -> Result<UploadReport, LinkError> {
        self.config.validator(self.capacity).validate(mission)?;

        let items = flatten(mission);
        if items.len() > MAX_WAYPOINT_NUMBER {
            return Err(LinkError::TooManyItems { count: items.len() });
        }
        info!(items = items.len(), save = persist, "uploading mission");

        let mut rejected = Vec::new();
        for item in &items {
            let frame = self.request(MSP_SET_WP, &encode_record(item))?;
            if frame.is_error() {
                warn!(number = item.number, action = %item.action, "waypoint rejected");
                metrics::counter!(metric_defs::WAYPOINTS_REJECTED.name).increment(1);
                rejected.push(item.number);
            } else {
                debug!(number = item.number, "waypoint stored");
            }
        }

        let saved = if persist { self.save_mission()? } else { false };

        let device = self.wp_info()?;
        info!("Waypoints: {}", device);
        Ok(UploadReport {
            sent: items.len(),
            rejected,
            saved,
            device,
        })
    }

    /// Replace the mission with a single return-to-home.
    pub fn clear(&mut self, persist: bool) -> Result<UploadReport, LinkError> {
        let mission = MultiMission::from_items(vec![MissionItem::rth(false)]);
        self.upload(&mission, persist)
    }
}
