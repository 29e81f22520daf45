pub mod error;
pub mod link;
pub mod mav;
pub mod report;
pub mod sequencer;
pub mod service;
pub mod state;

use serde::Deserialize;

pub use error::{LaunchError, LinkError};
pub use link::{ParamValue, VehicleLink};
pub use sequencer::{launch, LaunchProfile, LaunchReport, LaunchState, Step};
pub use service::{arm, compile_and_launch, fly_to, force_land, launch_patrol, LaunchOptions, Vehicle};

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// mavlink connection url. Examples:
    /// "udpin:0.0.0.0:14550", "tcpout:127.0.0.1:5760", "serial:/dev/ttyACM0:57600"
    pub url: String,

    /// MAVLink ids we use (ground side)
    pub sys_id: u8,
    pub comp_id: u8,

    /// target system/component (FC side). 1/1 is common for ArduPilot.
    pub target_sys: u8,
    pub target_comp: u8,

    /// How long a single request waits for its reply. Default 5s.
    pub reply_timeout_ms: Option<u64>,

    /// Optional: heartbeat send interval (companion heartbeat). Default 1Hz.
    pub send_heartbeat_hz: Option<f32>,
}
