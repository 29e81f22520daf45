//! Numeric encoding and role -> command/frame policy shared by both compilers.

use sortie_proto::{CommandCode, Frame};

use crate::error::MissionError;

/// Degrees are carried on the wire as degrees * 1e7.
pub const DEG_SCALE: f64 = 1e7;

/// Minimum climb pitch for NAV_TAKEOFF (param1), degrees.
pub const TAKEOFF_MIN_PITCH_DEG: f32 = 15.0;

/// What an item does in the flight plan. Decided once at compile time from its
/// position, never from waypoint content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Home,
    Takeoff,
    Waypoint,
    Land,
    Jump,
}

/// Role of the waypoint with 1-based `order` in a mission of `n` waypoints.
///
/// A single-waypoint mission is both first and last; takeoff wins.
pub fn role_for(order: i32, n: usize) -> Role {
    if order == 1 {
        Role::Takeoff
    } else if order as usize == n {
        Role::Land
    } else {
        Role::Waypoint
    }
}

pub fn command_for(role: Role) -> CommandCode {
    match role {
        Role::Home | Role::Waypoint => CommandCode::Waypoint,
        Role::Takeoff => CommandCode::Takeoff,
        Role::Land => CommandCode::Land,
        Role::Jump => CommandCode::Jump,
    }
}

pub fn frame_for(role: Role) -> Frame {
    match role {
        Role::Jump => Frame::Global,
        _ => Frame::GlobalRelativeAlt,
    }
}

/// Command parameters (param1..param4) for a role.
pub fn params_for(role: Role) -> [f32; 4] {
    match role {
        Role::Takeoff => [TAKEOFF_MIN_PITCH_DEG, 0.0, 0.0, 0.0],
        _ => [0.0; 4],
    }
}

/// `trunc(deg * 1e7)`. Truncates toward zero, it does not round.
pub fn encode_degrees(deg: f64) -> Result<i32, MissionError> {
    if !deg.is_finite() {
        return Err(MissionError::OutOfRange { field: "degrees", value: deg });
    }
    let scaled = (deg * DEG_SCALE).trunc();
    if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(MissionError::OutOfRange { field: "degrees", value: deg });
    }
    Ok(scaled as i32)
}

pub fn check_lat(lat: f64) -> Result<(), MissionError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(MissionError::OutOfRange { field: "latitude", value: lat });
    }
    Ok(())
}

pub fn check_lon(lon: f64) -> Result<(), MissionError> {
    if !(-180.0..=180.0).contains(&lon) {
        return Err(MissionError::OutOfRange { field: "longitude", value: lon });
    }
    Ok(())
}
