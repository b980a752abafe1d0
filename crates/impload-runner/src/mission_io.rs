//! Mission files.
//!
//! Missions are read and written as JSON. A file holds either a full
//! [`MultiMission`] or a bare array of items, which becomes a single
//! segment. The path `-` means stdin or stdout. Geo-points at 0,0 in a
//! mission that is read take their segment's home position.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use chrono::Utc;
use impload_mission::{resolve_home, MissionItem, MultiMission};
use serde::Deserialize;

use crate::error::RunnerError;

/// Path meaning stdin or stdout.
pub const STDIO: &str = "-";

#[derive(Deserialize)]
#[serde(untagged)]
enum MissionFile {
    Multi(MultiMission),
    Items(Vec<MissionItem>),
}

/// Read a mission from `path`.
pub fn read_mission(path: &str) -> Result<MultiMission, RunnerError> {
    let reader: Box<dyn Read> = if path == STDIO {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(path).map_err(|source| RunnerError::MissionFile {
            path: path.to_string(),
            source,
        })?;
        Box::new(BufReader::new(file))
    };
    parse_mission(reader, path)
}

fn parse_mission(reader: impl Read, path: &str) -> Result<MultiMission, RunnerError> {
    let file: MissionFile =
        serde_json::from_reader(reader).map_err(|source| RunnerError::MissionFormat {
            path: path.to_string(),
            source,
        })?;
    let mut mission = match file {
        MissionFile::Multi(mission) => mission,
        MissionFile::Items(items) => MultiMission::from_items(items),
    };
    for segment in &mut mission.segments {
        resolve_home(segment);
    }
    Ok(mission)
}

/// Write `mission` to `path` as pretty JSON.
pub fn write_mission(path: &str, mission: &MultiMission) -> Result<(), RunnerError> {
    let io_err = |source| RunnerError::MissionFile {
        path: path.to_string(),
        source,
    };
    let mut writer: Box<dyn Write> = if path == STDIO {
        Box::new(io::stdout().lock())
    } else {
        Box::new(BufWriter::new(File::create(path).map_err(io_err)?))
    };
    serde_json::to_writer_pretty(&mut writer, mission).map_err(|source| {
        RunnerError::MissionFormat {
            path: path.to_string(),
            source,
        }
    })?;
    writeln!(writer).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

/// Record where and when a downloaded mission came from.
pub fn stamp(mission: &mut MultiMission, source: &str) {
    let now = Utc::now();
    mission.comment = format!("downloaded from {}", source);
    for segment in &mut mission.segments {
        segment.metadata.timestamp = Some(now);
        segment.metadata.generator = Some(mission.version.clone());
    }
}
