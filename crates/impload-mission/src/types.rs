//! Mission data model.
//!
//! - [`Action`] - what a mission item does
//! - [`MissionItem`] - one step of a mission
//! - [`MissionSegment`] - an ordered list of items plus its [`Metadata`]
//! - [`MultiMission`] - one or more segments held by the flight controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flag marking the last item of a segment.
pub const FLAG_LAST: u8 = 0xA5;
/// Flag marking a geo-point whose zero coordinates mean "home position".
pub const FLAG_HOME: u8 = 0x48;

// ============================================================================
// Action
// ============================================================================

/// Mission item action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Fly to a position.
    #[default]
    Waypoint,
    /// Hold position indefinitely.
    PosholdUnlim,
    /// Hold position for `p1` seconds.
    PosholdTime,
    /// Return to home; `p1 == 1` also lands.
    Rth,
    /// Set a point of interest.
    SetPoi,
    /// Jump to item `p1`, `p2` times (-1 forever).
    Jump,
    /// Set heading.
    SetHead,
    /// Land at a position.
    Land,
    /// Action code this program does not know.
    Unknown,
}

impl Action {
    /// Decode a wire action code.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Action::Waypoint,
            2 => Action::PosholdUnlim,
            3 => Action::PosholdTime,
            4 => Action::Rth,
            5 => Action::SetPoi,
            6 => Action::Jump,
            7 => Action::SetHead,
            8 => Action::Land,
            _ => Action::Unknown,
        }
    }

    /// Wire action code. Unknown actions are sent as waypoints.
    pub fn code(self) -> u8 {
        match self {
            Action::Waypoint | Action::Unknown => 1,
            Action::PosholdUnlim => 2,
            Action::PosholdTime => 3,
            Action::Rth => 4,
            Action::SetPoi => 5,
            Action::Jump => 6,
            Action::SetHead => 7,
            Action::Land => 8,
        }
    }

    /// Whether items with this action carry a position.
    pub fn is_geo_point(self) -> bool {
        !matches!(self, Action::Rth | Action::Jump | Action::SetHead)
    }

    /// Whether a JUMP may target an item with this action.
    pub fn is_jump_target(self) -> bool {
        matches!(self, Action::Waypoint | Action::PosholdTime | Action::Land)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Waypoint => "WAYPOINT",
            Action::PosholdUnlim => "POSHOLD_UNLIM",
            Action::PosholdTime => "POSHOLD_TIME",
            Action::Rth => "RTH",
            Action::SetPoi => "SET_POI",
            Action::Jump => "JUMP",
            Action::SetHead => "SET_HEAD",
            Action::Land => "LAND",
            Action::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Mission Item
// ============================================================================

/// One mission step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    /// 1-based position within its segment.
    pub number: u16,
    pub action: Action,
    /// Latitude in degrees.
    #[serde(default)]
    pub lat: f64,
    /// Longitude in degrees.
    #[serde(default)]
    pub lon: f64,
    /// Altitude in metres.
    #[serde(default)]
    pub alt: i32,
    #[serde(default)]
    pub p1: i16,
    #[serde(default)]
    pub p2: i16,
    #[serde(default)]
    pub p3: i16,
    /// [`FLAG_LAST`], [`FLAG_HOME`] or 0.
    #[serde(default)]
    pub flag: u8,
}

impl MissionItem {
    /// Create an item with zeroed parameters.
    pub fn new(action: Action, lat: f64, lon: f64, alt: i32) -> Self {
        Self {
            number: 0,
            action,
            lat,
            lon,
            alt,
            p1: 0,
            p2: 0,
            p3: 0,
            flag: 0,
        }
    }

    /// Create a waypoint.
    pub fn waypoint(lat: f64, lon: f64, alt: i32) -> Self {
        Self::new(Action::Waypoint, lat, lon, alt)
    }

    /// Create a JUMP to 1-based `target`, repeated `repeat` times.
    pub fn jump(target: i16, repeat: i16) -> Self {
        Self {
            p1: target,
            p2: repeat,
            ..Self::new(Action::Jump, 0.0, 0.0, 0)
        }
    }

    /// Create a return-to-home, optionally landing.
    pub fn rth(land: bool) -> Self {
        Self {
            p1: land as i16,
            ..Self::new(Action::Rth, 0.0, 0.0, 0)
        }
    }

    /// Whether this item ends its segment.
    pub fn is_last(&self) -> bool {
        self.flag == FLAG_LAST
    }
}

// ============================================================================
// Segments
// ============================================================================

/// Per-segment metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Map zoom level hint.
    pub zoom: i32,
    pub center_lat: f64,
    pub center_lon: f64,
    pub home_lat: f64,
    pub home_lon: f64,
    /// When the segment was created or fetched.
    pub timestamp: Option<DateTime<Utc>>,
    /// Program that produced the segment.
    pub generator: Option<String>,
}

/// An ordered list of mission items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionSegment {
    #[serde(default)]
    pub metadata: Metadata,
    pub items: Vec<MissionItem>,
}

impl MissionSegment {
    /// Create a segment with default metadata.
    pub fn new(items: Vec<MissionItem>) -> Self {
        Self {
            metadata: Metadata::default(),
            items,
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the segment has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renumber items 1..=n.
    pub fn renumber(&mut self) {
        for (i, item) in self.items.iter_mut().enumerate() {
            item.number = i as u16 + 1;
        }
    }
}

/// One or more mission segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMission {
    /// Free-form provenance note.
    #[serde(default)]
    pub comment: String,
    /// Producer and format version.
    #[serde(default = "default_version")]
    pub version: String,
    pub segments: Vec<MissionSegment>,
}

fn default_version() -> String {
    concat!("impload ", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for MultiMission {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MultiMission {
    /// Create a mission from segments.
    pub fn new(segments: Vec<MissionSegment>) -> Self {
        Self {
            comment: String::new(),
            version: default_version(),
            segments,
        }
    }

    /// Create a single-segment mission.
    pub fn from_items(items: Vec<MissionItem>) -> Self {
        let mut segment = MissionSegment::new(items);
        segment.renumber();
        Self::new(vec![segment])
    }

    /// Items across all segments.
    pub fn total_items(&self) -> usize {
        self.segments.iter().map(MissionSegment::len).sum()
    }

    /// Whether there are no items at all.
    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}
