//! Launch choreography: clear -> upload -> configure -> settle -> arm -> start.
//!
//! Each step starts only after the previous one has been acknowledged. The
//! first failure ends the launch; nothing is retried and completed steps are
//! not rolled back, so the vehicle may be left with a partial mission or
//! partially applied parameters.

use sortie_proto::MissionItem;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{LaunchError, LinkError};
use crate::link::{ParamValue, VehicleLink};

/// Throttle-safety parameters applied before arming, in order.
pub const TAKEOFF_THROTTLE_PARAMS: [(&str, ParamValue); 3] = [
    ("TKOFF_THR_MINACC", ParamValue::Float(0.0)),
    ("TKOFF_THR_MINSPD", ParamValue::Float(0.0)),
    ("TKOFF_THR_DELAY", ParamValue::Int(0)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clear,
    Upload,
    SetParam(&'static str),
    Arm,
    Start,
    Land,
    Goto,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Clear => f.write_str("clear"),
            Step::Upload => f.write_str("upload"),
            Step::SetParam(name) => write!(f, "set_param({})", name),
            Step::Arm => f.write_str("arm"),
            Step::Start => f.write_str("start"),
            Step::Land => f.write_str("land"),
            Step::Goto => f.write_str("goto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    Clearing,
    Uploading,
    Configuring,
    Settling,
    Arming,
    Starting,
    Succeeded,
    Failed(Step),
}

impl LaunchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchState::Succeeded | LaunchState::Failed(_))
    }
}

/// Where the settling delay sits in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePoint {
    BeforeArm,
    BeforeStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    pub clear: Duration,
    pub upload: Duration,
    pub param: Duration,
    pub arm: Duration,
    pub start: Duration,
    pub land: Duration,
    pub goto: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            clear: Duration::from_secs(5),
            upload: Duration::from_secs(10),
            param: Duration::from_secs(3),
            arm: Duration::from_secs(5),
            start: Duration::from_secs(5),
            land: Duration::from_secs(5),
            goto: Duration::from_secs(5),
        }
    }
}

impl StepTimeouts {
    pub fn for_step(&self, step: Step) -> Duration {
        match step {
            Step::Clear => self.clear,
            Step::Upload => self.upload,
            Step::SetParam(_) => self.param,
            Step::Arm => self.arm,
            Step::Start => self.start,
            Step::Land => self.land,
            Step::Goto => self.goto,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchProfile {
    /// ESC / ground-effect settling delay.
    pub settle: Duration,
    pub settle_point: SettlePoint,
    /// `None` lets each step wait as long as the link does.
    pub timeouts: Option<StepTimeouts>,
}

impl LaunchProfile {
    /// Waypoint-list launch: settle before arming, no per-step bounds.
    pub fn mission() -> Self {
        Self { settle: Duration::from_secs(1), settle_point: SettlePoint::BeforeArm, timeouts: None }
    }

    /// Patrol launch: settle between arm and start, every step bounded.
    pub fn patrol() -> Self {
        Self {
            settle: Duration::from_secs(2),
            settle_point: SettlePoint::BeforeStart,
            timeouts: Some(StepTimeouts::default()),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn timeout_for(&self, step: Step) -> Option<Duration> {
        self.timeouts.map(|t| t.for_step(step))
    }
}

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub started_at: OffsetDateTime,
    pub elapsed: Duration,
    pub items: usize,
    pub completed: Vec<Step>,
    pub trace: Vec<LaunchState>,
}

/// Run `fut` as launch step `step`, bounded by `limit` when given.
pub async fn run_step<F>(step: Step, limit: Option<Duration>, fut: F) -> Result<(), LaunchError>
where
    F: Future<Output = Result<(), LinkError>>,
{
    let res = match limit {
        Some(d) => match tokio::time::timeout(d, fut).await {
            Ok(r) => r,
            Err(_) => return Err(LaunchError::StepTimeout(step)),
        },
        None => fut.await,
    };
    res.map_err(|source| LaunchError::StepRejected { step, source })
}

/// Upload `items` and start them on `link`. Resolves once, with `Ok` only
/// after the vehicle acknowledged mission start.
pub async fn launch(
    link: &dyn VehicleLink,
    items: &[MissionItem],
    profile: &LaunchProfile,
) -> Result<LaunchReport, LaunchError> {
    Sequencer::new(link, profile).run(items).await
}

struct Sequencer<'a> {
    link: &'a dyn VehicleLink,
    profile: &'a LaunchProfile,
    state: LaunchState,
    trace: Vec<LaunchState>,
    completed: Vec<Step>,
}

impl<'a> Sequencer<'a> {
    fn new(link: &'a dyn VehicleLink, profile: &'a LaunchProfile) -> Self {
        Self { link, profile, state: LaunchState::Idle, trace: vec![LaunchState::Idle], completed: Vec::new() }
    }

    fn enter(&mut self, next: LaunchState) {
        debug!("launch: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.trace.push(next);
    }

    async fn step<F>(&mut self, step: Step, fut: F) -> Result<(), LaunchError>
    where
        F: Future<Output = Result<(), LinkError>>,
    {
        match run_step(step, self.profile.timeout_for(step), fut).await {
            Ok(()) => {
                info!("launch: {} ok", step);
                self.completed.push(step);
                Ok(())
            }
            Err(e) => {
                self.enter(LaunchState::Failed(step));
                warn!("launch: aborted at {}: {} (completed: {:?})", step, e, self.completed);
                Err(e)
            }
        }
    }

    async fn run(mut self, items: &[MissionItem]) -> Result<LaunchReport, LaunchError> {
        let started = Instant::now();
        let started_at = OffsetDateTime::now_utc();
        let link = self.link;
        info!("launch: {} items, settle {:?} {:?}", items.len(), self.profile.settle, self.profile.settle_point);

        while !self.state.is_terminal() {
            let next = match self.state {
                LaunchState::Idle => LaunchState::Clearing,
                LaunchState::Clearing => {
                    self.step(Step::Clear, link.clear_mission()).await?;
                    LaunchState::Uploading
                }
                LaunchState::Uploading => {
                    self.step(Step::Upload, link.upload_mission(items)).await?;
                    LaunchState::Configuring
                }
                LaunchState::Configuring => {
                    for (name, value) in TAKEOFF_THROTTLE_PARAMS {
                        self.step(Step::SetParam(name), link.set_parameter(name, value)).await?;
                    }
                    match self.profile.settle_point {
                        SettlePoint::BeforeArm => LaunchState::Settling,
                        SettlePoint::BeforeStart => LaunchState::Arming,
                    }
                }
                LaunchState::Settling => {
                    tokio::time::sleep(self.profile.settle).await;
                    if self.completed.contains(&Step::Arm) {
                        LaunchState::Starting
                    } else {
                        LaunchState::Arming
                    }
                }
                LaunchState::Arming => {
                    self.step(Step::Arm, link.arm()).await?;
                    match self.profile.settle_point {
                        SettlePoint::BeforeArm => LaunchState::Starting,
                        SettlePoint::BeforeStart => LaunchState::Settling,
                    }
                }
                LaunchState::Starting => {
                    self.step(Step::Start, link.start_mission()).await?;
                    LaunchState::Succeeded
                }
                LaunchState::Succeeded | LaunchState::Failed(_) => break,
            };
            self.enter(next);
        }

        info!("launch: mission started in {:?}", started.elapsed());
        Ok(LaunchReport {
            started_at,
            elapsed: started.elapsed(),
            items: items.len(),
            completed: self.completed,
            trace: self.trace,
        })
    }
}
