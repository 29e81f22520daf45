use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub rel_alt_m: f32,
    pub abs_alt_m: f32,
}

impl Position {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg, rel_alt_m: 0.0, abs_alt_m: 0.0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat={:.6} Lon={:.6} Alt={:.1}m", self.lat_deg, self.lon_deg, self.rel_alt_m)
    }
}

/// ArduPlane flight modes, keyed by HEARTBEAT custom_mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightMode {
    Manual,
    Circle,
    Stabilize,
    Training,
    Acro,
    Fbwa,
    Fbwb,
    Cruise,
    Autotune,
    Auto,
    Rtl,
    Loiter,
    Takeoff,
    Guided,
    Qstabilize,
    Qhover,
    Qloiter,
    Qland,
    Qrtl,
    Other(u32),
}

impl FlightMode {
    pub fn from_custom_mode(mode: u32) -> Self {
        match mode {
            0 => FlightMode::Manual,
            1 => FlightMode::Circle,
            2 => FlightMode::Stabilize,
            3 => FlightMode::Training,
            4 => FlightMode::Acro,
            5 => FlightMode::Fbwa,
            6 => FlightMode::Fbwb,
            7 => FlightMode::Cruise,
            8 => FlightMode::Autotune,
            10 => FlightMode::Auto,
            11 => FlightMode::Rtl,
            12 => FlightMode::Loiter,
            13 => FlightMode::Takeoff,
            15 => FlightMode::Guided,
            17 => FlightMode::Qstabilize,
            18 => FlightMode::Qhover,
            19 => FlightMode::Qloiter,
            20 => FlightMode::Qland,
            21 => FlightMode::Qrtl,
            other => FlightMode::Other(other),
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Other(n) => write!(f, "MODE({})", n),
            m => write!(f, "{}", format!("{:?}", m).to_uppercase()),
        }
    }
}
