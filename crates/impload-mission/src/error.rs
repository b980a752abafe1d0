//! Error types for the mission crate.

use thiserror::Error;

use crate::types::Action;

/// Errors that can occur when decoding or handling missions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissionError {
    /// Waypoint record shorter than the fixed record size.
    #[error("waypoint record too short: expected {expected} bytes, got {actual}")]
    RecordTooShort {
        /// Required length.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Mission failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Structural problems found by the [`Validator`](crate::Validator).
///
/// Segment, item and target numbers are 1-based, as a user sees them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// More items than the flight controller can hold.
    #[error("mission has {count} items, flight controller holds at most {capacity}")]
    CapacityExceeded {
        /// Items across all segments.
        count: usize,
        /// Capacity in force.
        capacity: usize,
    },

    /// JUMP target outside its segment.
    #[error("segment {segment} item {item}: JUMP target {target} outside segment of {length} items")]
    JumpTargetOutOfRange {
        segment: usize,
        item: usize,
        target: i32,
        length: usize,
    },

    /// JUMP target within one item of the jump itself.
    #[error("segment {segment} item {item}: JUMP target {target} is too close to the jump")]
    JumpTargetAdjacent {
        segment: usize,
        item: usize,
        target: i32,
    },

    /// JUMP repeat counter below -1.
    #[error("segment {segment} item {item}: JUMP repeat count {repeat} is below -1")]
    InvalidRepeat {
        segment: usize,
        item: usize,
        repeat: i16,
    },

    /// JUMP lands on an item that cannot be jumped to.
    #[error(
        "segment {segment} item {item}: JUMP target {target} is {action}, \
         expected WAYPOINT, POSHOLD_TIME or LAND"
    )]
    InvalidJumpTarget {
        segment: usize,
        item: usize,
        target: i32,
        action: Action,
    },
}
