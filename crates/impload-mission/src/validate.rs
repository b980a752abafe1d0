//! Structural mission checks: total capacity and JUMP targets.

use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::types::{Action, MissionSegment, MultiMission};

/// Capacity assumed before the flight controller has reported its own.
pub const DEFAULT_CAPACITY: usize = 120;

/// Mission validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    capacity: usize,
    bypass: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Validator {
    /// Create a validator enforcing `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bypass: false,
        }
    }

    /// Let every mission pass [`validate`](Self::validate).
    pub fn with_bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    /// Capacity in force.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether checks are bypassed.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Check a mission, returning the first problem found.
    pub fn validate(&self, mission: &MultiMission) -> Result<(), ValidationError> {
        if self.bypass {
            debug!("mission validation bypassed");
            return Ok(());
        }
        match self.check(mission).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether the mission passes [`validate`](Self::validate).
    pub fn is_valid(&self, mission: &MultiMission) -> bool {
        self.validate(mission).is_ok()
    }

    /// Log every problem as a warning and return them.
    ///
    /// For missions that are read rather than uploaded, where a failure is
    /// worth knowing about but not fatal. Reports nothing when bypassed.
    pub fn report(&self, mission: &MultiMission) -> Vec<ValidationError> {
        if self.bypass {
            return Vec::new();
        }
        let problems = self.check(mission);
        for problem in &problems {
            warn!("Mission fails verification: {}", problem);
        }
        problems
    }

    /// Every problem in the mission, ignoring any bypass.
    pub fn check(&self, mission: &MultiMission) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let count = mission.total_items();
        if count > self.capacity {
            errors.push(ValidationError::CapacityExceeded {
                count,
                capacity: self.capacity,
            });
        }

        for (index, segment) in mission.segments.iter().enumerate() {
            check_jumps(index + 1, segment, &mut errors);
        }

        errors
    }
}

fn check_jumps(segment_no: usize, segment: &MissionSegment, errors: &mut Vec<ValidationError>) {
    let length = segment.items.len();

    for (i, item) in segment.items.iter().enumerate() {
        if item.action != Action::Jump {
            continue;
        }

        let item_no = i + 1;
        let target = item.p1 as i32;
        // 0-based target position
        let t = target - 1;
        let pos = i as i32;

        if t < 0 || t >= length as i32 {
            errors.push(ValidationError::JumpTargetOutOfRange {
                segment: segment_no,
                item: item_no,
                target,
                length,
            });
            continue;
        }

        if t > pos - 2 && t < pos + 2 {
            errors.push(ValidationError::JumpTargetAdjacent {
                segment: segment_no,
                item: item_no,
                target,
            });
        }

        if item.p2 < -1 {
            errors.push(ValidationError::InvalidRepeat {
                segment: segment_no,
                item: item_no,
                repeat: item.p2,
            });
        }

        let action = segment.items[t as usize].action;
        if !action.is_jump_target() {
            errors.push(ValidationError::InvalidJumpTarget {
                segment: segment_no,
                item: item_no,
                target,
                action,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MissionItem;

    fn wp() -> MissionItem {
        MissionItem::waypoint(54.0, -4.0, 30)
    }

    #[test]
    fn test_report_honours_bypass() {
        let tight = MultiMission::from_items(vec![wp(), MissionItem::jump(1, 1), wp()]);
        assert_eq!(Validator::default().report(&tight).len(), 1);
        assert!(Validator::default().with_bypass(true).report(&tight).is_empty());
        assert!(Validator::default().report(&MultiMission::from_items(vec![wp()])).is_empty());
    }

    #[test]
    fn test_jump_band() {
        let tight = MultiMission::from_items(vec![wp(), MissionItem::jump(1, 1), wp()]);
        assert!(matches!(
            Validator::default().validate(&tight),
            Err(ValidationError::JumpTargetAdjacent {
                segment: 1,
                item: 2,
                target: 1
            })
        ));

        let ok = MultiMission::from_items(vec![wp(), wp(), wp(), MissionItem::jump(1, 1), wp()]);
        assert!(Validator::default().is_valid(&ok));
    }

    #[test]
    fn test_jump_to_self_and_next() {
        let to_self = MultiMission::from_items(vec![wp(), wp(), wp(), MissionItem::jump(4, 0)]);
        assert!(!Validator::default().is_valid(&to_self));

        let forward = MultiMission::from_items(vec![MissionItem::jump(2, 0), wp(), wp()]);
        assert!(!Validator::default().is_valid(&forward));

        let far_forward = MultiMission::from_items(vec![MissionItem::jump(3, 0), wp(), wp()]);
        assert!(Validator::default().is_valid(&far_forward));
    }

    #[test]
    fn test_jump_out_of_range() {
        for target in [0, 6, -3] {
            let mission = MultiMission::from_items(vec![
                wp(),
                wp(),
                wp(),
                MissionItem::jump(target, 0),
                wp(),
            ]);
            assert!(matches!(
                Validator::default().validate(&mission),
                Err(ValidationError::JumpTargetOutOfRange { length: 5, .. })
            ));
        }
    }

    #[test]
    fn test_jump_repeat() {
        let forever = MultiMission::from_items(vec![wp(), wp(), wp(), MissionItem::jump(1, -1)]);
        assert!(Validator::default().is_valid(&forever));

        let bad = MultiMission::from_items(vec![wp(), wp(), wp(), MissionItem::jump(1, -2)]);
        assert!(matches!(
            Validator::default().validate(&bad),
            Err(ValidationError::InvalidRepeat { repeat: -2, .. })
        ));
    }

    #[test]
    fn test_jump_target_action() {
        let mut items = vec![MissionItem::rth(false), wp(), wp(), MissionItem::jump(1, 0)];
        let mission = MultiMission::from_items(items.clone());
        assert!(matches!(
            Validator::default().validate(&mission),
            Err(ValidationError::InvalidJumpTarget {
                action: Action::Rth,
                ..
            })
        ));

        items[0] = MissionItem::new(Action::PosholdTime, 1.0, 1.0, 10);
        assert!(Validator::default().is_valid(&MultiMission::from_items(items.clone())));

        items[0] = MissionItem::new(Action::Land, 1.0, 1.0, 0);
        assert!(Validator::default().is_valid(&MultiMission::from_items(items)));
    }

    #[test]
    fn test_jumps_are_segment_local() {
        let first = MissionSegment::new(vec![wp(), wp()]);
        let second = MissionSegment::new(vec![wp(), wp(), MissionItem::jump(4, 0)]);
        let mission = MultiMission::new(vec![first, second]);
        assert!(matches!(
            Validator::default().validate(&mission),
            Err(ValidationError::JumpTargetOutOfRange {
                segment: 2,
                item: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_capacity() {
        let full = MultiMission::from_items(vec![wp(); 120]);
        assert!(Validator::new(120).is_valid(&full));

        let over = MultiMission::from_items(vec![wp(); 121]);
        assert_eq!(
            Validator::new(120).validate(&over),
            Err(ValidationError::CapacityExceeded {
                count: 121,
                capacity: 120
            })
        );
    }

    #[test]
    fn test_capacity_counts_all_segments() {
        let mission = MultiMission::new(vec![
            MissionSegment::new(vec![wp(); 6]),
            MissionSegment::new(vec![wp(); 5]),
        ]);
        assert!(!Validator::new(10).is_valid(&mission));
        assert!(Validator::new(11).is_valid(&mission));
    }

    #[test]
    fn test_bypass() {
        let over = MultiMission::from_items(vec![wp(); 121]);
        let validator = Validator::new(120).with_bypass(true);
        assert!(validator.is_valid(&over));
        assert_eq!(validator.check(&over).len(), 1);
    }
}
