//! Result data types.

use pf_core::Real;
use pf_sim::{RunOutcome, SimRecord};
use serde::{Deserialize, Serialize};

/// One line of a solution stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotRecord<S> {
    pub time: Real,
    pub state: S,
}

/// State needed to restart a run at `time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint<S> {
    pub time: Real,
    pub state: S,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub start_time: Real,
    pub end_time: Real,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarted_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub final_time: Real,
    pub steps: usize,
    pub solve_attempts: usize,
    pub output_times: Vec<Real>,
    pub final_dt: Real,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunStatus {
    Completed,
    Steady { time: Real },
    Diverged { time: Real, dt: Real },
    MaxStepsReached { time: Real },
}

impl From<RunOutcome> for RunStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::ReachedEndTime => RunStatus::Completed,
            RunOutcome::Steady { time } => RunStatus::Steady { time },
            RunOutcome::Diverged { time, dt } => RunStatus::Diverged { time, dt },
            RunOutcome::MaxStepsReached { time } => RunStatus::MaxStepsReached { time },
        }
    }
}

impl From<&SimRecord> for RunSummary {
    fn from(record: &SimRecord) -> Self {
        Self {
            status: record.outcome.into(),
            final_time: record.final_time,
            steps: record.steps,
            solve_attempts: record.solve_attempts,
            output_times: record.output_times.clone(),
            final_dt: record.final_dt,
        }
    }
}
