//! Output schedule and step/output synchronization.

use pf_core::{Real, TIME_EPSILON, same_time};

use crate::error::{SimError, SimResult};
use crate::observe::Observer;
use crate::step_size::TimeStepSize;

/// One requested output.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "serde_impl::RawRequest", into = "serde_impl::RawRequest")
)]
pub enum OutputRequest {
    /// A literal, non-negative simulation time.
    Time(Real),
    /// The end time of the run.
    End,
    /// Every step from here on.
    All,
}

/// Ordered output requests.
///
/// Literal times must be finite, non-negative and strictly increasing.
/// Progress through the schedule is tracked by a cursor owned by the
/// caller; see [`synchronize`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "Vec<OutputRequest>",
        into = "Vec<OutputRequest>"
    )
)]
pub struct OutputSchedule {
    requests: Vec<OutputRequest>,
}

impl OutputSchedule {
    pub fn new(requests: Vec<OutputRequest>) -> SimResult<Self> {
        let mut last: Option<Real> = None;
        for req in &requests {
            if let OutputRequest::Time(t) = *req {
                if !t.is_finite() || t < 0.0 {
                    return Err(SimError::InvalidArg {
                        what: "output times must be finite and non-negative",
                    });
                }
                if last.is_some_and(|prev| t <= prev) {
                    return Err(SimError::InvalidArg {
                        what: "output times must be strictly increasing",
                    });
                }
                last = Some(t);
            }
        }
        Ok(Self { requests })
    }

    /// No explicit output requests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Output once, at the end time.
    pub fn at_end() -> Self {
        Self {
            requests: vec![OutputRequest::End],
        }
    }

    /// Output on every step.
    pub fn every_step() -> Self {
        Self {
            requests: vec![OutputRequest::All],
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, cursor: usize) -> Option<OutputRequest> {
        self.requests.get(cursor).copied()
    }

    pub fn requests(&self) -> &[OutputRequest] {
        &self.requests
    }

    /// First cursor position whose entry is still ahead of `time`.
    ///
    /// Used when a run starts (or restarts) part way through the schedule.
    pub fn cursor_after(&self, time: Real) -> usize {
        self.requests
            .iter()
            .position(|req| match *req {
                OutputRequest::Time(t) => t > time + TIME_EPSILON,
                OutputRequest::End | OutputRequest::All => true,
            })
            .unwrap_or(self.requests.len())
    }
}

impl TryFrom<Vec<OutputRequest>> for OutputSchedule {
    type Error = SimError;

    fn try_from(requests: Vec<OutputRequest>) -> Result<Self, Self::Error> {
        Self::new(requests)
    }
}

impl From<OutputSchedule> for Vec<OutputRequest> {
    fn from(schedule: OutputSchedule) -> Self {
        schedule.requests
    }
}

/// Where the next step lands and whether it is an output step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncOutcome {
    /// End of the step; never past the end time.
    pub next_time: Real,
    pub output: bool,
    /// Schedule cursor after this step.
    pub cursor: usize,
    /// Time the current schedule entry resolved to; `None` for an empty or
    /// exhausted schedule and for `All`.
    pub target: Option<Real>,
}

/// Plan the next step against the end time and the output schedule.
///
/// 1. `next_time = current_time + dt`.
/// 2. If that passes `end_time`, the step is shrunk to land on it.
/// 3. The schedule entry under `cursor` is resolved (`End` to
///    `end_time`). A literal time that would be overshot shrinks the step
///    again, so schedule clamping is applied to the already end-clamped
///    `next_time`. Landing on the target within [`TIME_EPSILON`] makes this
///    an output step that ends exactly on the target, and advances the
///    cursor except for `End`. `All` marks
///    every step as output and never advances.
///
/// Shrinking may go below the step size floor (see [`TimeStepSize::land`]).
/// It fails with [`SimError::StepSizeTooSmall`] if the remaining interval
/// is not above [`TIME_EPSILON`].
pub fn synchronize(
    current_time: Real,
    step: &mut TimeStepSize,
    end_time: Real,
    schedule: &OutputSchedule,
    cursor: usize,
    observer: &dyn Observer,
) -> SimResult<SyncOutcome> {
    let mut next_time = current_time + step.value();

    if next_time > end_time {
        next_time = end_time;
        step.land(next_time - current_time, observer)?;
    }

    let mut outcome = SyncOutcome {
        next_time,
        output: false,
        cursor,
        target: None,
    };

    let target = match schedule.get(cursor) {
        None => return Ok(outcome),
        Some(OutputRequest::All) => {
            outcome.output = true;
            return Ok(outcome);
        }
        Some(OutputRequest::End) => end_time,
        Some(OutputRequest::Time(t)) => t,
    };
    outcome.target = Some(target);

    if outcome.next_time > target {
        outcome.next_time = target;
        step.land(target - current_time, observer)?;
    }

    if same_time(outcome.next_time, target) {
        // Output steps end on the scheduled instant, not a rounding of it.
        outcome.next_time = target.min(end_time);
        outcome.output = true;
        if schedule.get(cursor) != Some(OutputRequest::End) {
            outcome.cursor += 1;
        }
    }

    Ok(outcome)
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::OutputRequest;

    #[derive(serde::Serialize, serde::Deserialize)]
    #[serde(untagged)]
    pub(super) enum RawRequest {
        Time(f64),
        Token(String),
    }

    impl TryFrom<RawRequest> for OutputRequest {
        type Error = String;

        fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
            match raw {
                RawRequest::Time(t) => Ok(OutputRequest::Time(t)),
                RawRequest::Token(s) => match s.as_str() {
                    "end" => Ok(OutputRequest::End),
                    "all" => Ok(OutputRequest::All),
                    other => Err(format!(
                        "unknown output request '{other}' (expected a time, 'end' or 'all')"
                    )),
                },
            }
        }
    }

    impl From<OutputRequest> for RawRequest {
        fn from(req: OutputRequest) -> Self {
            match req {
                OutputRequest::Time(t) => RawRequest::Time(t),
                OutputRequest::End => RawRequest::Token("end".to_string()),
                OutputRequest::All => RawRequest::Token("all".to_string()),
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::observe::NullObserver;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn next_time_never_passes_end(
            t0 in 0.0_f64..1.0,
            span in 1e-3_f64..2.0,
            dt in 1e-6_f64..1.0,
            out_frac in 0.01_f64..1.5,
        ) {
            let end_time = t0 + span;
            let sched = OutputSchedule::new(vec![
                OutputRequest::Time(t0 + out_frac * span),
                OutputRequest::End,
            ]).unwrap();
            let mut step = TimeStepSize::fixed(dt).unwrap();
            let out = synchronize(t0, &mut step, end_time, &sched, 0, &NullObserver).unwrap();
            prop_assert!(out.next_time <= end_time);
            prop_assert!(out.next_time > t0);
            prop_assert!(out.cursor <= sched.len());
        }
    }
}
