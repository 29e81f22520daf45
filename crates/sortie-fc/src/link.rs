use async_trait::async_trait;
use sortie_proto::{FlightMode, MissionItem, Position};
use std::fmt;

use crate::error::LinkError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Connection to one vehicle. Owned by whoever opened it; the mission core only
/// borrows it for the duration of a launch.
///
/// Every operation resolves exactly once. Reads wait for the next sample and
/// are unbounded; callers decide how long to wait.
#[async_trait]
pub trait VehicleLink: Send + Sync {
    async fn read_position(&self) -> Result<Position, LinkError>;

    async fn read_flight_mode(&self) -> Result<FlightMode, LinkError>;

    async fn clear_mission(&self) -> Result<(), LinkError>;

    async fn upload_mission(&self, items: &[MissionItem]) -> Result<(), LinkError>;

    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<(), LinkError>;

    async fn arm(&self) -> Result<(), LinkError>;

    async fn start_mission(&self) -> Result<(), LinkError>;

    async fn land(&self) -> Result<(), LinkError>;

    /// Fly to a point and loiter there. `alt_m` is above mean sea level.
    async fn goto(&self, lat: f64, lon: f64, alt_m: f32) -> Result<(), LinkError>;
}
