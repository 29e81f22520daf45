//! Caller-facing launch API: pick the compiler, sample home, run the sequencer.

use sortie_mission::encode::{check_lat, check_lon};
use sortie_mission::{compile, compile_patrol, Mission, MissionError};
use sortie_proto::Position;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{LaunchError, LinkError};
use crate::link::VehicleLink;
use crate::sequencer::{launch, run_step, LaunchProfile, LaunchReport, Step, StepTimeouts};

pub struct Vehicle {
    pub id: String,
    pub link: Arc<dyn VehicleLink>,
    /// Set by the caller before launch; the launch API only reads it.
    pub active_mission: Option<Mission>,
}

impl Vehicle {
    pub fn new(id: impl Into<String>, link: Arc<dyn VehicleLink>) -> Self {
        Self { id: id.into(), link, active_mission: None }
    }

    pub fn with_mission(mut self, mission: Mission) -> Self {
        self.active_mission = Some(mission);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Bound on the single home-position read.
    pub home_timeout: Duration,
    /// Overrides the profile's settling delay.
    pub settle: Option<Duration>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { home_timeout: Duration::from_secs(10), settle: None }
    }
}

impl LaunchOptions {
    fn apply(&self, profile: LaunchProfile) -> LaunchProfile {
        match self.settle {
            Some(d) => profile.with_settle(d),
            None => profile,
        }
    }
}

/// Wait for one position sample to anchor the mission's home item.
pub async fn read_home(link: &dyn VehicleLink, timeout: Duration) -> Result<Position, LaunchError> {
    match tokio::time::timeout(timeout, link.read_position()).await {
        Ok(Ok(pos)) => Ok(pos),
        Ok(Err(e)) => {
            warn!("launch: home position read failed: {}", e);
            Err(LaunchError::HomeReadFailed(e))
        }
        Err(_) => Err(LaunchError::HomePositionUnavailable(timeout)),
    }
}

/// Compile the vehicle's active mission against its current position and
/// launch it.
pub async fn compile_and_launch(vehicle: &Vehicle, opts: &LaunchOptions) -> Result<LaunchReport, LaunchError> {
    let mission = vehicle.active_mission.as_ref().ok_or(LaunchError::NoActiveMission)?;
    // Shape errors never reach the link.
    mission.validate()?;

    let home = read_home(vehicle.link.as_ref(), opts.home_timeout).await?;
    let items = compile(&mission.waypoints, &home)?;
    info!("vehicle {}: mission {} compiled to {} items, home {}", vehicle.id, mission.id, items.len(), home);

    launch(vehicle.link.as_ref(), &items, &opts.apply(LaunchProfile::mission())).await
}

/// Launch the fixed patrol loop at `altitude_m` above the current position.
pub async fn launch_patrol(vehicle: &Vehicle, altitude_m: f32, opts: &LaunchOptions) -> Result<LaunchReport, LaunchError> {
    if !altitude_m.is_finite() || altitude_m <= 0.0 {
        return Err(MissionError::InvalidAltitude(altitude_m).into());
    }

    let home = read_home(vehicle.link.as_ref(), opts.home_timeout).await?;
    let items = compile_patrol(&home, altitude_m)?;
    info!("vehicle {}: patrol at {}m, home {}", vehicle.id, altitude_m, home);

    launch(vehicle.link.as_ref(), &items, &opts.apply(LaunchProfile::patrol())).await
}

/// Standalone commands are bounded by the default step timeouts.
async fn standalone<F>(step: Step, fut: F) -> Result<(), LaunchError>
where
    F: std::future::Future<Output = Result<(), LinkError>>,
{
    run_step(step, Some(StepTimeouts::default().for_step(step)), fut).await
}

pub async fn force_land(vehicle: &Vehicle) -> Result<(), LaunchError> {
    info!("vehicle {}: land requested", vehicle.id);
    standalone(Step::Land, vehicle.link.land()).await
}

/// Arm without uploading or starting anything.
pub async fn arm(vehicle: &Vehicle) -> Result<(), LaunchError> {
    info!("vehicle {}: arm requested", vehicle.id);
    standalone(Step::Arm, vehicle.link.arm()).await
}

/// Send the vehicle to `lat`/`lon` at `alt_m` above mean sea level.
pub async fn fly_to(vehicle: &Vehicle, lat: f64, lon: f64, alt_m: f32) -> Result<(), LaunchError> {
    check_lat(lat).map_err(LaunchError::InvalidTarget)?;
    check_lon(lon).map_err(LaunchError::InvalidTarget)?;
    if !alt_m.is_finite() {
        return Err(LaunchError::InvalidTarget(MissionError::InvalidAltitude(alt_m)));
    }

    info!("vehicle {}: goto lat={:.6} lon={:.6} alt={:.1}m", vehicle.id, lat, lon, alt_m);
    standalone(Step::Goto, vehicle.link.goto(lat, lon, alt_m)).await
}
