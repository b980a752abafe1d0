//! Mission clean-up applied before upload.

use crate::types::{Action, MissionItem, MissionSegment, MultiMission, FLAG_HOME};

/// Options for [`sanitise`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitiseOptions {
    /// Altitude (m) given to waypoints with zero altitude.
    pub default_alt: i32,
    /// Speed (m/s) given to waypoints without one. 0 leaves them alone.
    pub default_speed: f64,
    /// Append a return-to-home to every segment.
    pub force_rth: bool,
    /// Append a return-to-home that lands. Implies `force_rth`.
    pub force_land: bool,
}

/// Fill in default altitude and speed, and optionally append RTH items.
pub fn sanitise(mission: &mut MultiMission, options: &SanitiseOptions) {
    for segment in &mut mission.segments {
        for item in segment
            .items
            .iter_mut()
            .filter(|i| i.action == Action::Waypoint)
        {
            if options.default_speed != 0.0 && item.p1 == 0 {
                // speed is carried in cm/s
                item.p1 = (options.default_speed * 100.0) as i16;
            }
            if item.alt == 0 {
                item.alt = options.default_alt;
            }
        }

        if options.force_rth || options.force_land {
            add_rth(segment, options.force_land);
        }
    }
}

/// Make the segment end with a return-to-home.
///
/// A trailing RTH is kept and only its land parameter updated.
pub fn add_rth(segment: &mut MissionSegment, land: bool) {
    match segment.items.last_mut() {
        Some(last) if last.action == Action::Rth => {
            last.p1 = land as i16;
        }
        _ => {
            let mut rth = MissionItem::rth(land);
            rth.number = segment.items.len() as u16 + 1;
            segment.items.push(rth);
        }
    }
}

/// Mark geo-points at 0,0 as home-relative and substitute the home position.
pub fn resolve_home(segment: &mut MissionSegment) {
    let (home_lat, home_lon) = (segment.metadata.home_lat, segment.metadata.home_lon);
    for item in segment
        .items
        .iter_mut()
        .filter(|i| i.action.is_geo_point())
    {
        if item.lat == 0.0 && item.lon == 0.0 {
            item.flag = FLAG_HOME;
        }
        if item.flag == FLAG_HOME {
            if item.lat == 0.0 {
                item.lat = home_lat;
            }
            if item.lon == 0.0 {
                item.lon = home_lon;
            }
        }
    }
}

/// Set the segment's map centre to the mean of its geo-points.
pub fn update_center(segment: &mut MissionSegment) {
    let points: Vec<(f64, f64)> = segment
        .items
        .iter()
        .filter(|i| i.action.is_geo_point())
        .map(|i| (i.lat, i.lon))
        .collect();
    if points.is_empty() {
        return;
    }
    let n = points.len() as f64;
    segment.metadata.center_lat = points.iter().map(|p| p.0).sum::<f64>() / n;
    segment.metadata.center_lon = points.iter().map(|p| p.1).sum::<f64>() / n;
}
