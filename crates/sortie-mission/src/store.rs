use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sortie_proto::Waypoint;
use std::path::Path;

use crate::compiler::validate_shape;
use crate::error::MissionError;

pub const DEFAULT_MISSION_ID: &str = "mission-default";

const DEFAULT_MISSION_WPS: &str = include_str!("../missions/default_mission_wps.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub waypoints: Vec<Waypoint>,
}

// JSON documents are either a bare waypoint array or a full mission object.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDoc {
    Waypoints(Vec<Waypoint>),
    Mission(Mission),
}

impl Mission {
    pub fn new(id: impl Into<String>, waypoints: Vec<Waypoint>) -> Self {
        Self { id: id.into(), waypoints }
    }

    /// The mission bundled with the binary.
    pub fn default_mission() -> Result<Self> {
        let waypoints = parse_json(DEFAULT_MISSION_WPS, DEFAULT_MISSION_ID)
            .context("parse bundled default mission")?
            .waypoints;
        Ok(Self::new(DEFAULT_MISSION_ID, waypoints))
    }

    pub fn validate(&self) -> Result<(), MissionError> {
        validate_shape(&self.waypoints).map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Load a waypoint document. `.toml` files are read as TOML, anything else as
/// JSON. Missions without an explicit id take the file stem.
pub fn load_mission(path: &Path) -> Result<Mission> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read mission {}", path.display()))?;
    let fallback_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_MISSION_ID);

    let mission = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str::<Mission>(&s).with_context(|| format!("parse mission toml {}", path.display()))?,
        _ => parse_json(&s, fallback_id).with_context(|| format!("parse mission json {}", path.display()))?,
    };

    tracing::info!("mission: loaded {} ({} waypoints) from {}", mission.id, mission.len(), path.display());
    Ok(mission)
}

fn parse_json(s: &str, fallback_id: &str) -> Result<Mission> {
    Ok(match serde_json::from_str::<JsonDoc>(s)? {
        JsonDoc::Waypoints(waypoints) => Mission::new(fallback_id, waypoints),
        JsonDoc::Mission(m) => m,
    })
}
