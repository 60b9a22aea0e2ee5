//! Macro time-step loop and run recording.

use pf_core::{BoundedValue, Real, STEADY_RELATIVE_TOLERANCE, TIME_EPSILON};

use crate::adaptive::AdaptiveStepController;
use crate::error::{SimError, SimResult};
use crate::model::{SnapshotSink, StepSolver};
use crate::observe::{Observer, SimEvent};
use crate::schedule::{OutputRequest, OutputSchedule, synchronize};
use crate::steady::SteadyStateDetector;
use crate::step_size::TimeStepSize;

/// Step size range: `min` is the floor for halving, `initial` the first
/// size tried.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepBounds {
    pub min: Real,
    pub initial: Real,
    pub max: Real,
}

impl StepBounds {
    /// Constant step size; the controller never halves it.
    pub fn fixed(dt: Real) -> Self {
        Self {
            min: dt,
            initial: dt,
            max: dt,
        }
    }

    pub fn time_step_size(&self) -> SimResult<TimeStepSize> {
        TimeStepSize::new(BoundedValue::new(self.min, self.initial, self.max)?)
    }
}

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimOptions {
    pub time_step_bounds: StepBounds,
    pub start_time: Real,
    pub end_time: Real,
    pub output_times: OutputSchedule,
    /// Stop early once the relative time residual is below
    /// `steady_tolerance`.
    pub stop_when_steady: bool,
    pub steady_tolerance: Real,
    /// Maximum number of accepted steps (safety limit)
    pub max_steps: usize,
    /// Keep rejected solve candidates in the sink's debug stream.
    pub debug: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            time_step_bounds: StepBounds::fixed(1e-3),
            start_time: 0.0,
            end_time: 1.0,
            output_times: OutputSchedule::at_end(),
            stop_when_steady: false,
            steady_tolerance: STEADY_RELATIVE_TOLERANCE,
            max_steps: 1_000_000,
            debug: false,
        }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunOutcome {
    ReachedEndTime,
    /// Stopped early on steady state at `time`.
    Steady { time: Real },
    /// The step size floor was reached without convergence; `time` is the
    /// last accepted time.
    Diverged { time: Real, dt: Real },
    MaxStepsReached { time: Real },
}

/// Record of a simulation run.
#[derive(Clone, Debug)]
pub struct SimRecord {
    pub outcome: RunOutcome,
    pub final_time: Real,
    /// Accepted macro steps
    pub steps: usize,
    /// Total calls to the nonlinear solve
    pub solve_attempts: usize,
    /// Times at which solution snapshots were written
    pub output_times: Vec<Real>,
    /// Step size at the end of the run
    pub final_dt: Real,
    pub last_unsteadiness: Option<Real>,
}

impl SimRecord {
    /// Turn a diverged run into [`SimError::RetryExhausted`].
    pub fn ensure_completed(self) -> SimResult<Self> {
        match self.outcome {
            RunOutcome::Diverged { time, dt } => Err(SimError::RetryExhausted { time, dt }),
            _ => Ok(self),
        }
    }

    pub fn diverged(&self) -> bool {
        matches!(self.outcome, RunOutcome::Diverged { .. })
    }
}

/// Run a transient simulation from `initial` at `opts.start_time`.
///
/// The initial state is written as the first snapshot. Each macro step is
/// planned against the output schedule, solved by the adaptive controller,
/// then committed. Output steps also write a restart checkpoint.
///
/// Returns the last accepted state. Retry exhaustion is not an `Err`: it
/// ends the run with [`RunOutcome::Diverged`].
pub fn run_sim<S: StepSolver>(
    solver: &mut S,
    initial: S::State,
    bcs: &S::Boundary,
    opts: &SimOptions,
    sink: &mut dyn SnapshotSink<S::State>,
    observer: &dyn Observer,
) -> SimResult<(S::State, SimRecord)> {
    validate(opts)?;

    let mut step = opts.time_step_bounds.time_step_size()?;
    let controller = AdaptiveStepController::new(opts.debug);
    let detector = SteadyStateDetector::new(opts.steady_tolerance);
    let schedule = &opts.output_times;

    let mut time = opts.start_time;
    let mut cursor = schedule.cursor_after(time);
    let mut w_n = initial;
    let mut w = w_n.clone();

    let mut record = SimRecord {
        outcome: RunOutcome::ReachedEndTime,
        final_time: time,
        steps: 0,
        solve_attempts: 0,
        output_times: Vec::new(),
        final_dt: step.value(),
        last_unsteadiness: None,
    };

    sink.write_solution(&w_n, time)?;
    record.output_times.push(time);
    observer.emit(&SimEvent::OutputWritten { time });

    tracing::info!(
        start = time,
        end = opts.end_time,
        dt = step.value(),
        "starting transient run"
    );

    while time < opts.end_time - TIME_EPSILON {
        if record.steps >= opts.max_steps {
            tracing::warn!(time, max_steps = opts.max_steps, "step limit reached");
            record.outcome = RunOutcome::MaxStepsReached { time };
            break;
        }

        let plan = synchronize(time, &mut step, opts.end_time, schedule, cursor, observer)?;
        let planned_dt = step.value();

        let outcome = controller.advance(&mut step, solver, &mut w, &w_n, bcs, sink, observer)?;
        record.solve_attempts += outcome.attempts;
        if !outcome.converged {
            tracing::warn!(
                time,
                dt = step.value(),
                "solve did not converge at the minimum time step size"
            );
            record.outcome = RunOutcome::Diverged {
                time,
                dt: step.value(),
            };
            break;
        }

        // A halved step no longer lands where the plan said.
        let (next_time, output) = if step.value() == planned_dt {
            cursor = plan.cursor;
            (plan.next_time, plan.output)
        } else {
            let every_step = schedule.get(cursor) == Some(OutputRequest::All);
            (time + step.value(), every_step)
        };

        record.steps += 1;
        time = next_time;
        observer.emit(&SimEvent::StepAccepted {
            time,
            dt: step.value(),
        });
        // A sub-floor landing only covers the step it landed.
        step.end_landing(observer);

        if output {
            write_output(sink, &w, time, &mut record, observer)?;
        }

        if opts.stop_when_steady {
            let check = detector.check(&w, &w_n, observer);
            record.last_unsteadiness = Some(check.unsteadiness);
            if check.steady {
                tracing::info!(time, "reached steady state");
                if !output {
                    write_output(sink, &w, time, &mut record, observer)?;
                }
                record.outcome = RunOutcome::Steady { time };
                w_n.clone_from(&w);
                break;
            }
        }

        w_n.clone_from(&w);
    }

    record.final_time = time;
    record.final_dt = step.value();
    tracing::info!(
        time,
        steps = record.steps,
        attempts = record.solve_attempts,
        "transient run finished"
    );
    Ok((w_n, record))
}

fn write_output<T>(
    sink: &mut dyn SnapshotSink<T>,
    w: &T,
    time: Real,
    record: &mut SimRecord,
    observer: &dyn Observer,
) -> SimResult<()> {
    sink.write_solution(w, time)?;
    sink.write_checkpoint(w, time)?;
    record.output_times.push(time);
    observer.emit(&SimEvent::OutputWritten { time });
    Ok(())
}

fn validate(opts: &SimOptions) -> SimResult<()> {
    if !opts.start_time.is_finite() || !opts.end_time.is_finite() {
        return Err(SimError::InvalidArg {
            what: "start_time and end_time must be finite",
        });
    }
    if opts.end_time < opts.start_time {
        return Err(SimError::InvalidArg {
            what: "end_time must not be before start_time",
        });
    }
    if opts.max_steps == 0 {
        return Err(SimError::InvalidArg {
            what: "max_steps must be positive",
        });
    }
    if opts.steady_tolerance.is_nan() || opts.steady_tolerance <= 0.0 {
        return Err(SimError::InvalidArg {
            what: "steady_tolerance must be positive",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemorySink, NullSink};
    use crate::observe::NullObserver;

    /// Backward Euler for `x' = -k x`, exact solve.
    struct Decay {
        k: Real,
    }

    impl StepSolver for Decay {
        type State = f64;
        type Boundary = ();

        fn solve(&mut self, dt: Real, w: &mut f64, w_n: &f64, _bcs: &()) -> bool {
            *w = *w_n / (1.0 + self.k * dt);
            true
        }
    }

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.time_step_bounds, StepBounds::fixed(1e-3));
        assert_eq!(opts.start_time, 0.0);
        assert_eq!(opts.end_time, 1.0);
        assert_eq!(opts.output_times.requests(), &[OutputRequest::End]);
        assert_eq!(opts.steady_tolerance, STEADY_RELATIVE_TOLERANCE);
    }

    #[test]
    fn sim_options_invalid() {
        let mut solver = Decay { k: 1.0 };
        let opts = SimOptions {
            start_time: 1.0,
            end_time: 0.5,
            ..SimOptions::default()
        };
        let res = run_sim(&mut solver, 1.0, &(), &opts, &mut NullSink, &NullObserver);
        assert!(matches!(res, Err(SimError::InvalidArg { .. })));

        let opts = SimOptions {
            max_steps: 0,
            ..SimOptions::default()
        };
        let res = run_sim(&mut solver, 1.0, &(), &opts, &mut NullSink, &NullObserver);
        assert!(res.is_err());
    }

    #[test]
    fn reaches_end_and_writes_schedule() {
        let mut solver = Decay { k: 1.0 };
        let opts = SimOptions {
            time_step_bounds: StepBounds::fixed(0.1),
            end_time: 0.35,
            output_times: OutputSchedule::new(vec![
                OutputRequest::Time(0.2),
                OutputRequest::End,
            ])
            .unwrap(),
            ..SimOptions::default()
        };
        let mut sink = MemorySink::<f64>::new();
        let (w, record) =
            run_sim(&mut solver, 1.0, &(), &opts, &mut sink, &NullObserver).unwrap();

        assert_eq!(record.outcome, RunOutcome::ReachedEndTime);
        assert!((record.final_time - 0.35).abs() < 1e-12);
        assert_eq!(record.steps, 4);
        assert_eq!(record.output_times.len(), 3);
        assert_eq!(sink.solution_times()[0], 0.0);
        assert!((sink.solution_times()[1] - 0.2).abs() < 1e-12);
        assert!((sink.solution_times()[2] - 0.35).abs() < 1e-12);
        assert_eq!(sink.checkpoints.len(), 2);
        assert!(w < 1.0 && w > 0.0);
    }

    /// Backward Euler for `x' = k (1 - x)`, relaxing towards 1.
    struct Relax {
        k: Real,
    }

    impl StepSolver for Relax {
        type State = f64;
        type Boundary = ();

        fn solve(&mut self, dt: Real, w: &mut f64, w_n: &f64, _bcs: &()) -> bool {
            *w = (*w_n + self.k * dt) / (1.0 + self.k * dt);
            true
        }
    }

    #[test]
    fn stops_when_steady() {
        let mut solver = Relax { k: 50.0 };
        let opts = SimOptions {
            time_step_bounds: StepBounds::fixed(0.1),
            end_time: 100.0,
            output_times: OutputSchedule::empty(),
            stop_when_steady: true,
            ..SimOptions::default()
        };
        let mut sink = MemorySink::<f64>::new();
        let (w, record) =
            run_sim(&mut solver, 0.0, &(), &opts, &mut sink, &NullObserver).unwrap();

        let RunOutcome::Steady { time } = record.outcome else {
            panic!("expected steady outcome, got {:?}", record.outcome);
        };
        assert!(time < 2.0);
        assert!((w - 1.0).abs() < 1e-3);
        assert!(record.last_unsteadiness.unwrap() < STEADY_RELATIVE_TOLERANCE);
        // Initial state plus the steady state.
        assert_eq!(sink.solutions.len(), 2);
        assert_eq!(sink.solution_times()[1], time);
    }

    #[test]
    fn pure_decay_is_never_steady() {
        // The relative change of x' = -k x is constant from step to step.
        let mut solver = Decay { k: 50.0 };
        let opts = SimOptions {
            time_step_bounds: StepBounds::fixed(0.1),
            end_time: 1.0,
            stop_when_steady: true,
            ..SimOptions::default()
        };
        let (_, record) =
            run_sim(&mut solver, 1.0, &(), &opts, &mut NullSink, &NullObserver).unwrap();
        assert_eq!(record.outcome, RunOutcome::ReachedEndTime);
        assert!((record.last_unsteadiness.unwrap() - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn max_steps_limit() {
        let mut solver = Decay { k: 1.0 };
        let opts = SimOptions {
            time_step_bounds: StepBounds::fixed(0.1),
            end_time: 10.0,
            max_steps: 3,
            ..SimOptions::default()
        };
        let (_, record) =
            run_sim(&mut solver, 1.0, &(), &opts, &mut NullSink, &NullObserver).unwrap();
        assert!(matches!(record.outcome, RunOutcome::MaxStepsReached { .. }));
        assert_eq!(record.steps, 3);
    }

    #[test]
    fn zero_length_run_only_writes_initial_state() {
        let mut solver = Decay { k: 1.0 };
        let opts = SimOptions {
            start_time: 0.5,
            end_time: 0.5,
            ..SimOptions::default()
        };
        let mut sink = MemorySink::<f64>::new();
        let (_, record) =
            run_sim(&mut solver, 1.0, &(), &opts, &mut sink, &NullObserver).unwrap();
        assert_eq!(record.steps, 0);
        assert_eq!(sink.solution_times(), vec![0.5]);
    }
}
