//! Command actions.
//!
//! Each action takes a connected [`Engine`] so it runs the same against a
//! real flight controller or [`impload_link::sim::SimulatedFc`].

use impload_link::{DownloadReport, Engine, LinkConfig, UploadReport};
use impload_mission::{sanitise, SanitiseOptions, ValidationError, Validator};
use tracing::{info, warn};

use crate::cli::MULTI_MISSION_SETTING;
use crate::error::RunnerError;
use crate::mission_io::{read_mission, stamp, write_mission};

/// `impload <version>`.
pub fn version_string() -> String {
    format!("impload {}", env!("CARGO_PKG_VERSION"))
}

/// Read, clean up and upload the mission in `path`.
pub fn upload_file(
    engine: &mut Engine,
    path: &str,
    options: &SanitiseOptions,
    persist: bool,
) -> Result<UploadReport, RunnerError> {
    let mut mission = read_mission(path)?;
    engine
        .config()
        .validator(engine.capacity())
        .report(&mission);
    sanitise(&mut mission, options);
    let report = engine.upload(&mission, persist)?;
    if !report.rejected.is_empty() {
        warn!(
            "{} waypoint(s) not acknowledged: {:?}",
            report.rejected.len(),
            report.rejected
        );
    }
    if persist && !report.saved {
        warn!("Mission was not saved to storage");
    }
    Ok(report)
}

/// Download the mission and write it to `path`.
///
/// A mission that fails validation is still written; its problems have
/// been logged as warnings and come back in the report.
pub fn download_to(
    engine: &mut Engine,
    path: &str,
    restore: bool,
    source: &str,
) -> Result<DownloadReport, RunnerError> {
    let mut report = engine.download_report(restore)?;
    stamp(&mut report.mission, source);
    write_mission(path, &report.mission)?;
    info!(
        "Downloaded {} item(s) in {} segment(s)",
        report.mission.total_items(),
        report.mission.segments.len()
    );
    Ok(report)
}

/// Report the active multi-mission index, or set it and write EEPROM.
pub fn multi_index(engine: &mut Engine, index: Option<u8>) -> Result<u8, RunnerError> {
    match index {
        Some(index) => {
            engine.set_setting(MULTI_MISSION_SETTING, &[index])?;
            engine.eeprom_write()?;
            info!("Multi-mission index set to {}", index);
            Ok(index)
        }
        None => {
            let value = engine.get_setting(MULTI_MISSION_SETTING)?;
            let index = *value.first().ok_or_else(|| {
                RunnerError::UnexpectedReply(format!("{} is empty", MULTI_MISSION_SETTING))
            })?;
            info!("Multi-mission index {}", index);
            Ok(index)
        }
    }
}

/// Validate the mission in `path` without connecting.
///
/// Problems are reported as warnings, even when validation is bypassed for
/// uploads; the returned list is empty for a mission that would upload.
pub fn check_file(path: &str, config: &LinkConfig) -> Result<Vec<ValidationError>, RunnerError> {
    let mission = read_mission(path)?;
    let problems = Validator::new(config.default_capacity).report(&mission);
    if problems.is_empty() {
        info!("{}: {} item(s), OK", path, mission.total_items());
    }
    Ok(problems)
}
