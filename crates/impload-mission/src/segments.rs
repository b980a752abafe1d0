//! Conversion between segmented missions and the flat device array.
//!
//! The flight controller stores one flat list of items. Segment boundaries
//! survive the round trip because exactly the last item of each segment
//! carries [`FLAG_LAST`].

use crate::types::{MissionItem, MissionSegment, MultiMission, FLAG_HOME, FLAG_LAST};

/// Flatten all segments into one continuously numbered list.
///
/// Numbering starts at 1. The last item of every segment gets [`FLAG_LAST`];
/// other items keep [`FLAG_HOME`] if set and are otherwise cleared.
pub fn flatten(mission: &MultiMission) -> Vec<MissionItem> {
    let mut flat = Vec::with_capacity(mission.total_items());
    for segment in &mission.segments {
        let last = segment.items.len().saturating_sub(1);
        for (i, item) in segment.items.iter().enumerate() {
            let mut item = item.clone();
            item.number = flat.len() as u16 + 1;
            item.flag = if i == last {
                FLAG_LAST
            } else if item.flag == FLAG_HOME {
                FLAG_HOME
            } else {
                0
            };
            flat.push(item);
        }
    }
    flat
}

/// Split a flat device list back into segments.
///
/// Items are renumbered segment-local. Trailing items with no closing
/// [`FLAG_LAST`] form a final segment whose last flag is set.
pub fn split(items: Vec<MissionItem>) -> Vec<MissionSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<MissionItem> = Vec::new();

    for mut item in items {
        item.number = current.len() as u16 + 1;
        let ends_segment = item.is_last();
        current.push(item);
        if ends_segment {
            segments.push(MissionSegment::new(std::mem::take(&mut current)));
        }
    }

    if let Some(last) = current.last_mut() {
        last.flag = FLAG_LAST;
        segments.push(MissionSegment::new(current));
    }

    segments
}
