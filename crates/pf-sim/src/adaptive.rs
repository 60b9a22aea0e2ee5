//! Step-halving retry loop around the nonlinear solve.

use crate::error::SimResult;
use crate::model::{SnapshotSink, StepSolver};
use crate::observe::{Observer, SimEvent};
use crate::step_size::TimeStepSize;

/// Result of driving one macro step to convergence (or to the floor).
#[derive(Clone, Copy, Debug, PartialEq)]
#[must_use]
pub struct StepOutcome {
    pub converged: bool,
    /// Number of `solve` calls, including the successful one.
    pub attempts: usize,
}

/// Retries a failed solve with half the step size until it converges or
/// the step size floor is reached.
///
/// The number of attempts is bounded by `log2(initial / min) + 2`; there
/// is no other retry limit. Halving is permanent: the next macro step
/// starts from the reduced size.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdaptiveStepController {
    /// Write every rejected candidate to the sink's debug stream.
    pub debug: bool,
}

impl AdaptiveStepController {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Advance one macro step.
    ///
    /// On every failed attempt `w` is reset to `w_n`. `converged == false`
    /// in the outcome means the floor was reached and the step was not
    /// taken; the caller decides what happens next. `Err` is reserved for
    /// sink failures and step-size invariant violations.
    #[allow(clippy::too_many_arguments)]
    pub fn advance<S: StepSolver>(
        &self,
        step: &mut TimeStepSize,
        solver: &mut S,
        w: &mut S::State,
        w_n: &S::State,
        bcs: &S::Boundary,
        sink: &mut dyn SnapshotSink<S::State>,
        observer: &dyn Observer,
    ) -> SimResult<StepOutcome> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let dt = step.value();
            tracing::debug!(dt, attempt = attempts, "solving time step");

            if solver.solve(dt, w, w_n, bcs) {
                return Ok(StepOutcome {
                    converged: true,
                    attempts,
                });
            }

            observer.emit(&SimEvent::SolveDiverged {
                dt,
                attempt: attempts,
            });
            if self.debug {
                sink.write_debug(w)?;
            }
            w.clone_from(w_n);

            if step.at_floor() {
                observer.emit(&SimEvent::RetryExhausted { dt });
                return Ok(StepOutcome {
                    converged: false,
                    attempts,
                });
            }
            step.halve(observer)?;
        }
    }
}
