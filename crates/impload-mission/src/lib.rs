//! Waypoint mission model for impload.
//!
//! A flight controller stores a flat array of mission items. This crate
//! models that array as one or more segments, converts between the two
//! shapes, encodes the fixed 21-byte wire record, and checks the structural
//! rules the firmware relies on (capacity and JUMP targets).
//!
//! ```rust
//! use impload_mission::{flatten, MissionItem, MultiMission, Validator, FLAG_LAST};
//!
//! let mission = MultiMission::from_items(vec![
//!     MissionItem::waypoint(54.35, -4.52, 30),
//!     MissionItem::rth(true),
//! ]);
//! assert!(Validator::default().is_valid(&mission));
//!
//! let flat = flatten(&mission);
//! assert_eq!(flat[1].flag, FLAG_LAST);
//! ```

mod error;
mod record;
mod sanitise;
mod segments;
mod types;
mod validate;

pub use error::{MissionError, ValidationError};
pub use record::{decode_record, encode_record, WP_RECORD_SIZE};
pub use sanitise::{add_rth, resolve_home, sanitise, update_center, SanitiseOptions};
pub use segments::{flatten, split};
pub use types::{
    Action, Metadata, MissionItem, MissionSegment, MultiMission, FLAG_HOME, FLAG_LAST,
};
pub use validate::{Validator, DEFAULT_CAPACITY};
