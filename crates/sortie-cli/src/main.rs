use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sortie_fc::mav::MavLink;
use sortie_fc::report::spawn_reporter;
use sortie_fc::state::LinkStatus;
use sortie_fc::{arm, compile_and_launch, fly_to, force_land, launch_patrol, LaunchOptions, LinkConfig, Vehicle, VehicleLink};
use sortie_mission::{doctor as mission_doctor, load_mission, Mission};

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "sortie", version, about = "sortie - waypoint mission upload & launch for ArduPlane")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config and mission without touching the vehicle.
    Doctor,
    /// Upload the waypoint mission, arm and start it.
    Launch {
        /// Waypoint document (JSON or TOML). Defaults to [mission].path, then the bundled mission.
        #[arg(long)]
        mission: Option<String>,
        /// Keep reporting telemetry after the launch until Ctrl-C.
        #[arg(long)]
        follow: bool,
    },
    /// Take off and loop around a point near home forever.
    Patrol {
        #[arg(long)]
        alt: Option<f32>,
        #[arg(long)]
        follow: bool,
    },
    /// Arm the vehicle without starting a mission.
    Arm,
    /// Fly to a point. Without coordinates, flies to [saved_point].
    Goto {
        #[arg(long, requires_all = ["lon", "alt"])]
        lat: Option<f64>,
        #[arg(long, requires_all = ["lat", "alt"])]
        lon: Option<f64>,
        /// Metres above mean sea level.
        #[arg(long, requires_all = ["lat", "lon"])]
        alt: Option<f32>,
    },
    /// Command an immediate landing.
    Land,
    /// Print position and flight mode until Ctrl-C.
    Watch,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    vehicle: Option<VehicleCfg>,
    link: LinkConfig,
    mission: Option<MissionCfg>,
    launch: Option<LaunchCfg>,
    saved_point: Option<PointCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct VehicleCfg { id: String }

#[derive(Debug, serde::Deserialize)]
struct MissionCfg { path: Option<String> }

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct PointCfg {
    lat: f64,
    lon: f64,
    alt_m: f32,
}

impl Default for PointCfg {
    fn default() -> Self {
        Self { lat: -35.36038425, lon: 149.15558299, alt_m: 800.0 }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LaunchCfg {
    connect_timeout_ms: Option<u64>,
    home_timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
    patrol_altitude_m: Option<f32>,
    telemetry_interval_ms: Option<u64>,
}

const DEFAULT_PATROL_ALT_M: f32 = 50.0;

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

impl Config {
    fn launch_cfg(&self) -> LaunchCfg {
        self.launch.clone().unwrap_or_default()
    }

    fn vehicle_id(&self) -> String {
        self.vehicle.as_ref().map(|v| v.id.clone()).unwrap_or_else(|| format!("sys{}", self.link.target_sys))
    }

    fn launch_options(&self) -> LaunchOptions {
        let l = self.launch_cfg();
        let mut opts = LaunchOptions::default();
        if let Some(ms) = l.home_timeout_ms {
            opts.home_timeout = Duration::from_millis(ms);
        }
        opts.settle = l.settle_ms.map(Duration::from_millis);
        opts
    }

    fn patrol_alt(&self, flag: Option<f32>) -> f32 {
        flag.or(self.launch_cfg().patrol_altitude_m).unwrap_or(DEFAULT_PATROL_ALT_M)
    }

    fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.launch_cfg().telemetry_interval_ms.unwrap_or(1000))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Launch { mission, follow } => launch_cmd(&cfg, mission.as_deref(), follow).await?,
        Command::Patrol { alt, follow } => patrol_cmd(&cfg, alt, follow).await?,
        Command::Arm => arm_cmd(&cfg).await?,
        Command::Goto { lat, lon, alt } => goto_cmd(&cfg, lat, lon, alt).await?,
        Command::Land => land_cmd(&cfg).await?,
        Command::Watch => watch_cmd(&cfg).await?,
    }
    Ok(())
}

fn resolve_mission(cfg: &Config, flag: Option<&str>) -> Result<Mission> {
    let path = flag.map(str::to_string).or_else(|| cfg.mission.as_ref().and_then(|m| m.path.clone()));
    match path {
        Some(p) => load_mission(Path::new(&p)),
        None => {
            info!("mission: using bundled default");
            Mission::default_mission()
        }
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    anyhow::ensure!(!cfg.link.url.trim().is_empty(), "link.url missing");
    anyhow::ensure!(cfg.link.sys_id != cfg.link.target_sys, "link.sys_id must differ from link.target_sys");
    if let Some(hz) = cfg.link.send_heartbeat_hz {
        anyhow::ensure!(hz > 0.0, "link.send_heartbeat_hz must be > 0");
    }

    let mission = resolve_mission(cfg, None)?;
    mission_doctor::check_mission(&mission).with_context(|| format!("mission {}", mission.id))?;
    mission_doctor::check_patrol_altitude(cfg.patrol_alt(None))?;

    info!("doctor: OK (mission {} with {} waypoints)", mission.id, mission.len());
    Ok(())
}

/// Open the link and wait for the vehicle's first heartbeat.
async fn connect(cfg: &Config) -> Result<Arc<MavLink>> {
    let link = Arc::new(MavLink::connect(&cfg.link).await?);
    let wait = Duration::from_millis(cfg.launch_cfg().connect_timeout_ms.unwrap_or(15_000));
    info!("fc: waiting for heartbeat (up to {:?})", wait);
    let mode = tokio::time::timeout(wait, link.read_flight_mode())
        .await
        .context("no heartbeat from vehicle")??;
    info!("fc: connection ok, current flight mode is {}", mode);
    Ok(link)
}

async fn launch_cmd(cfg: &Config, mission_path: Option<&str>, follow: bool) -> Result<()> {
    let mission = resolve_mission(cfg, mission_path)?;
    let link = connect(cfg).await?;
    let status = Arc::new(Mutex::new(LinkStatus::new(&cfg.link.url)));
    let reporter = spawn_reporter(link.clone(), cfg.telemetry_interval(), status.clone());

    let vehicle = Vehicle::new(cfg.vehicle_id(), link).with_mission(mission);
    let report = compile_and_launch(&vehicle, &cfg.launch_options())
        .await
        .context("can't start the mission")?;
    println!("mission start command was sent successfully ({} items in {:?})", report.items, report.elapsed);

    if follow {
        wait_for_ctrl_c().await?;
    }
    reporter.stop();
    Ok(())
}

async fn patrol_cmd(cfg: &Config, alt: Option<f32>, follow: bool) -> Result<()> {
    let alt = cfg.patrol_alt(alt);
    mission_doctor::check_patrol_altitude(alt)?;
    let link = connect(cfg).await?;
    let status = Arc::new(Mutex::new(LinkStatus::new(&cfg.link.url)));
    let reporter = spawn_reporter(link.clone(), cfg.telemetry_interval(), status.clone());

    let vehicle = Vehicle::new(cfg.vehicle_id(), link);
    let report = launch_patrol(&vehicle, alt, &cfg.launch_options())
        .await
        .context("can't start the patrol")?;
    println!("patrol started at {}m ({:?})", alt, report.elapsed);

    if follow {
        wait_for_ctrl_c().await?;
    }
    reporter.stop();
    Ok(())
}

async fn arm_cmd(cfg: &Config) -> Result<()> {
    let link = connect(cfg).await?;
    let vehicle = Vehicle::new(cfg.vehicle_id(), link);
    arm(&vehicle).await.context("arm failed")?;
    println!("armed");
    Ok(())
}

async fn goto_cmd(cfg: &Config, lat: Option<f64>, lon: Option<f64>, alt: Option<f32>) -> Result<()> {
    let target = match (lat, lon, alt) {
        (Some(lat), Some(lon), Some(alt_m)) => PointCfg { lat, lon, alt_m },
        _ => cfg.saved_point.unwrap_or_default(),
    };
    let link = connect(cfg).await?;
    let vehicle = Vehicle::new(cfg.vehicle_id(), link);
    fly_to(&vehicle, target.lat, target.lon, target.alt_m).await.context("goto failed")?;
    println!("flying to lat={:.6} lon={:.6} alt={:.1}m", target.lat, target.lon, target.alt_m);
    Ok(())
}

async fn land_cmd(cfg: &Config) -> Result<()> {
    let link = connect(cfg).await?;
    let vehicle = Vehicle::new(cfg.vehicle_id(), link);
    force_land(&vehicle).await.context("land failed")?;
    println!("landing");
    Ok(())
}

async fn watch_cmd(cfg: &Config) -> Result<()> {
    let link = connect(cfg).await?;
    let status = Arc::new(Mutex::new(LinkStatus::new(&cfg.link.url)));
    let reporter = spawn_reporter(link, cfg.telemetry_interval(), status.clone());

    wait_for_ctrl_c().await?;
    reporter.stop();

    if let Ok(st) = status.lock() {
        println!("connected={}", st.connected);
        println!("url={:?}", st.url);
        println!("last_update_age={:?}", st.age());
        println!("position={:?}", st.position);
        println!("flight_mode={:?}", st.flight_mode);
    }
    Ok(())
}

async fn wait_for_ctrl_c() -> Result<()> {
    info!("press Ctrl-C to exit");
    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    warn!("interrupted");
    Ok(())
}
