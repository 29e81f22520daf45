use sortie_mission::MissionError;
use std::time::Duration;

use crate::sequencer::Step;

/// Failures reported by a vehicle link for a single request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("no reply to {0}")]
    NoReply(&'static str),

    #[error("{what} rejected by vehicle: {result}")]
    Rejected { what: &'static str, result: String },

    #[error("transport: {0}")]
    Transport(String),

    #[error("link closed")]
    Closed,
}

/// Terminal failure of a launch attempt.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid mission shape: {0}")]
    InvalidMissionShape(#[from] MissionError),

    #[error("vehicle has no active mission")]
    NoActiveMission,

    #[error("no home position within {0:?}")]
    HomePositionUnavailable(Duration),

    #[error("home position read failed: {0}")]
    HomeReadFailed(#[source] LinkError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[source] MissionError),

    #[error("step {0} timed out")]
    StepTimeout(Step),

    #[error("step {step} rejected: {source}")]
    StepRejected {
        step: Step,
        #[source]
        source: LinkError,
    },
}

impl LaunchError {
    /// The launch step that failed, if the failure happened inside the sequencer.
    pub fn step(&self) -> Option<Step> {
        match self {
            LaunchError::StepTimeout(step) | LaunchError::StepRejected { step, .. } => Some(*step),
            _ => None,
        }
    }
}
