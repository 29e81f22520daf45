use sortie_proto::{MissionItem, Position, Waypoint, MISSION_TYPE_MISSION};

use crate::encode::{self, Role};
use crate::error::MissionError;

/// Waypoints per mission. Item seq and MISSION_COUNT are u16 and seq 0 is home.
pub const MAX_WAYPOINTS: usize = u16::MAX as usize - 1;

/// Check that `waypoints` is non-empty, numerically sane, and that its orders
/// form `1..=N` once sorted. Returns the waypoints in ascending order.
pub fn validate_shape(waypoints: &[Waypoint]) -> Result<Vec<&Waypoint>, MissionError> {
    if waypoints.is_empty() {
        return Err(MissionError::Empty);
    }
    if waypoints.len() > MAX_WAYPOINTS {
        return Err(MissionError::TooManyWaypoints { count: waypoints.len(), max: MAX_WAYPOINTS });
    }

    let mut sorted: Vec<&Waypoint> = waypoints.iter().collect();
    sorted.sort_by_key(|wp| wp.order);

    for (i, wp) in sorted.iter().enumerate() {
        if wp.order < 1 {
            return Err(MissionError::InvalidOrder { order: wp.order });
        }
        let expected = i as i32 + 1;
        if wp.order != expected {
            if i > 0 && sorted[i - 1].order == wp.order {
                return Err(MissionError::DuplicateOrder { order: wp.order });
            }
            return Err(MissionError::OrderGap { expected, found: wp.order });
        }

        if !wp.lat.is_finite() {
            return Err(MissionError::NonFinite { field: "lat", order: wp.order });
        }
        if !wp.lon.is_finite() {
            return Err(MissionError::NonFinite { field: "lon", order: wp.order });
        }
        if !wp.alt.is_finite() {
            return Err(MissionError::NonFinite { field: "alt", order: wp.order });
        }
        encode::check_lat(wp.lat)?;
        encode::check_lon(wp.lon)?;
    }

    Ok(sorted)
}

/// Compile an ordered waypoint list into `N + 1` mission items.
///
/// Item 0 is the synthetic home anchor built from `home`; waypoint `k` lands at
/// `seq = k`. First waypoint takes off, last one lands, everything between is a
/// plain waypoint. Altitudes pass through unchanged.
pub fn compile(waypoints: &[Waypoint], home: &Position) -> Result<Vec<MissionItem>, MissionError> {
    let sorted = validate_shape(waypoints)?;
    let n = sorted.len();

    let mut items = Vec::with_capacity(n + 1);
    items.push(home_item(home)?);

    for wp in sorted {
        let role = encode::role_for(wp.order, n);
        let seq = u16::try_from(wp.order)
            .map_err(|_| MissionError::TooManyWaypoints { count: n, max: MAX_WAYPOINTS })?;
        items.push(item_for(seq, role, wp.lat, wp.lon, wp.alt)?);
    }

    tracing::debug!("compiler: {} waypoints -> {} items", n, items.len());
    Ok(items)
}

/// Synthetic home anchor at seq 0. MAVLink missions reserve slot 0 for home.
pub fn home_item(home: &Position) -> Result<MissionItem, MissionError> {
    let mut item = item_for(0, Role::Home, home.lat_deg, home.lon_deg, 0.0)?;
    item.current = true;
    Ok(item)
}

/// Rejects coordinates off the globe, derived patrol points included.
pub(crate) fn item_for(seq: u16, role: Role, lat: f64, lon: f64, alt: f32) -> Result<MissionItem, MissionError> {
    encode::check_lat(lat)?;
    encode::check_lon(lon)?;
    let command = encode::command_for(role);
    Ok(MissionItem {
        seq,
        frame: encode::frame_for(role),
        command,
        current: role == Role::Takeoff,
        autocontinue: true,
        params: encode::params_for(role),
        x: encode::encode_degrees(lat)?,
        y: encode::encode_degrees(lon)?,
        z: alt,
        mission_type: MISSION_TYPE_MISSION,
    })
}
