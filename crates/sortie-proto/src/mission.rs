use serde::{Deserialize, Serialize};
use std::fmt;

/// MAV_MISSION_TYPE_MISSION; every item this system produces is a flight plan item.
pub const MISSION_TYPE_MISSION: u8 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub order: i32,
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Global coordinates, altitude relative to home (MAV_FRAME_GLOBAL_RELATIVE_ALT_INT).
    GlobalRelativeAlt,
    /// Global / non-positional commands (MAV_FRAME_GLOBAL).
    Global,
}

impl Frame {
    pub fn code(self) -> u8 {
        match self {
            Frame::GlobalRelativeAlt => 6,
            Frame::Global => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCode {
    Waypoint,
    Takeoff,
    Land,
    Jump,
}

impl CommandCode {
    /// MAV_CMD id.
    pub fn code(self) -> u16 {
        match self {
            CommandCode::Waypoint => 16,
            CommandCode::Land => 21,
            CommandCode::Takeoff => 22,
            CommandCode::Jump => 177,
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandCode::Waypoint => "WAYPOINT",
            CommandCode::Takeoff => "TAKEOFF",
            CommandCode::Land => "LAND",
            CommandCode::Jump => "JUMP",
        };
        f.write_str(s)
    }
}

/// A compiled, protocol-ready mission item.
///
/// `x`/`y` are latitude/longitude in degrees * 1e7, `z` is metres in `frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub frame: Frame,
    pub command: CommandCode,
    pub current: bool,
    pub autocontinue: bool,
    pub params: [f32; 4],
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub mission_type: u8,
}

impl fmt::Display for MissionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} frame={} cur={} x={} y={} z={:.1} p={:?}",
            self.seq,
            self.command,
            self.frame.code(),
            self.current as u8,
            self.x,
            self.y,
            self.z,
            self.params
        )
    }
}
