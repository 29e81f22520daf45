use sortie_proto::{MissionItem, Position};

use crate::compiler::{home_item, item_for};
use crate::encode::Role;
use crate::error::MissionError;

/// Offset of the patrol waypoint from home, degrees on each axis.
pub const PATROL_OFFSET_DEG: f64 = 0.001;

/// DO_JUMP target: the patrol waypoint.
pub const PATROL_JUMP_TARGET: u16 = 2;

/// DO_JUMP repeat count meaning "forever".
pub const REPEAT_FOREVER: f32 = -1.0;

/// Fixed four-item loop: home, takeoff over home, one waypoint a short hop
/// away, then jump back to that waypoint indefinitely.
pub fn compile_patrol(home: &Position, altitude_m: f32) -> Result<Vec<MissionItem>, MissionError> {
    if !altitude_m.is_finite() || altitude_m <= 0.0 {
        return Err(MissionError::InvalidAltitude(altitude_m));
    }

    let anchor = home_item(home)?;
    let takeoff = item_for(1, Role::Takeoff, home.lat_deg, home.lon_deg, altitude_m)?;
    let hop = item_for(
        PATROL_JUMP_TARGET,
        Role::Waypoint,
        home.lat_deg + PATROL_OFFSET_DEG,
        home.lon_deg + PATROL_OFFSET_DEG,
        altitude_m,
    )?;

    let mut jump = item_for(3, Role::Jump, 0.0, 0.0, 0.0)?;
    jump.params = [PATROL_JUMP_TARGET as f32, REPEAT_FOREVER, 0.0, 0.0];

    Ok(vec![anchor, takeoff, hop, jump])
}
