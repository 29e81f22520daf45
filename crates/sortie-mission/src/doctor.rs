use anyhow::Result;
use crate::store::Mission;

/// Upper bound we accept for mission / patrol altitudes, metres AGL.
pub const MAX_ALT_M: f32 = 1000.0;

pub fn check_mission(mission: &Mission) -> Result<()> {
    anyhow::ensure!(!mission.id.trim().is_empty(), "mission.id empty");
    mission.validate()?;
    for wp in &mission.waypoints {
        anyhow::ensure!(wp.alt >= 0.0 && wp.alt <= MAX_ALT_M, "waypoint {} altitude {}m outside 0..{}", wp.order, wp.alt, MAX_ALT_M);
    }
    // Takeoff must actually climb unless it is also the only item
    if mission.len() > 1 {
        let first = mission.waypoints.iter().min_by_key(|wp| wp.order);
        if let Some(first) = first {
            anyhow::ensure!(first.alt > 0.0, "takeoff waypoint altitude must be > 0");
        }
    }
    Ok(())
}

pub fn check_patrol_altitude(alt_m: f32) -> Result<()> {
    anyhow::ensure!(alt_m.is_finite() && alt_m > 0.0, "launch.patrol_altitude_m must be > 0");
    anyhow::ensure!(alt_m <= MAX_ALT_M, "launch.patrol_altitude_m too high");
    Ok(())
}
