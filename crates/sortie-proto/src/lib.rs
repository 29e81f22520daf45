pub mod mission;
pub mod telemetry;

pub use mission::{CommandCode, Frame, MissionItem, Waypoint, MISSION_TYPE_MISSION};
pub use telemetry::{FlightMode, Position};
