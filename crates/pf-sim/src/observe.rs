//! Observability sink for step-size and convergence notices.
//!
//! Components never log "once per process" on their own; they are handed an
//! [`Observer`] and the observer decides who speaks. In a multi-rank run
//! every rank gets a [`TracingObserver`], but only rank 0 is an emitter.

use std::cell::RefCell;

use pf_core::Real;

/// Notices raised by the time-stepping core.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// The step size changed by more than machine epsilon.
    StepSizeChanged { dt: Real },
    /// Relative L2 norm of the time residual.
    Unsteadiness { value: Real },
    /// The solve rejected an attempt; `attempt` counts from 1.
    SolveDiverged { dt: Real, attempt: usize },
    /// The step size floor was reached without convergence.
    RetryExhausted { dt: Real },
    /// A macro step was accepted and the clock moved to `time`.
    StepAccepted { time: Real, dt: Real },
    /// A solution snapshot was written for `time`.
    OutputWritten { time: Real },
}

pub trait Observer {
    fn emit(&self, event: &SimEvent);
}

impl<F: Fn(&SimEvent)> Observer for F {
    fn emit(&self, event: &SimEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn emit(&self, _event: &SimEvent) {}
}

/// Forwards events to `tracing`, on the emitting process only.
#[derive(Clone, Copy, Debug)]
pub struct TracingObserver {
    emitter: bool,
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self { emitter: true }
    }
}

impl TracingObserver {
    /// Observer for worker `rank`; rank 0 is the single emitter.
    pub fn for_rank(rank: usize) -> Self {
        Self { emitter: rank == 0 }
    }

    pub fn is_emitter(&self) -> bool {
        self.emitter
    }
}

impl Observer for TracingObserver {
    fn emit(&self, event: &SimEvent) {
        if !self.emitter {
            return;
        }
        match *event {
            SimEvent::StepSizeChanged { dt } => {
                tracing::info!("Set time step size to dt = {dt}");
            }
            SimEvent::Unsteadiness { value } => {
                tracing::info!(
                    "Unsteadiness (L2 norm of relative time residual), || w_{{n+1}} - w_n || / || w_n || = {value}"
                );
            }
            SimEvent::SolveDiverged { dt, attempt } => {
                tracing::warn!(dt, attempt, "nonlinear solve did not converge");
            }
            SimEvent::RetryExhausted { dt } => {
                tracing::warn!(dt, "time step size floor reached without convergence");
            }
            SimEvent::StepAccepted { time, dt } => {
                tracing::debug!(time, dt, "step accepted");
            }
            SimEvent::OutputWritten { time } => {
                tracing::info!("Wrote solution at t = {time}");
            }
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<SimEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}

impl Observer for RecordingObserver {
    fn emit(&self, event: &SimEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn only_rank_zero_emits() {
        assert!(TracingObserver::for_rank(0).is_emitter());
        assert!(!TracingObserver::for_rank(3).is_emitter());
    }

    #[test]
    fn closures_are_observers() {
        let seen = Cell::new(0);
        let obs = |_: &SimEvent| seen.set(seen.get() + 1);
        obs.emit(&SimEvent::StepSizeChanged { dt: 0.5 });
        obs.emit(&SimEvent::Unsteadiness { value: 1.0 });
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn recording_keeps_order() {
        let rec = RecordingObserver::new();
        rec.emit(&SimEvent::StepSizeChanged { dt: 0.5 });
        rec.emit(&SimEvent::RetryExhausted { dt: 0.25 });
        assert_eq!(
            rec.events(),
            vec![
                SimEvent::StepSizeChanged { dt: 0.5 },
                SimEvent::RetryExhausted { dt: 0.25 }
            ]
        );
        assert_eq!(
            rec.count(|e| matches!(e, SimEvent::RetryExhausted { .. })),
            1
        );
    }
}
