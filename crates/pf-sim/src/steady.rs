//! Steady-state detection from successive time levels.

use pf_core::{FLOAT_EQUALITY_TOLERANCE, Real, STEADY_RELATIVE_TOLERANCE};

use crate::model::SolutionState;
use crate::observe::{Observer, SimEvent};

/// Relative change of the solution between two time levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteadyCheck {
    /// `||w - w_n|| / ||w_n||` in the L2 norm.
    pub unsteadiness: Real,
    pub steady: bool,
}

/// Flags a solution as steady once its relative time residual drops below
/// a fixed tolerance.
#[derive(Clone, Copy, Debug)]
pub struct SteadyStateDetector {
    pub relative_tolerance: Real,
}

impl Default for SteadyStateDetector {
    fn default() -> Self {
        Self {
            relative_tolerance: STEADY_RELATIVE_TOLERANCE,
        }
    }
}

impl SteadyStateDetector {
    pub fn new(relative_tolerance: Real) -> Self {
        Self { relative_tolerance }
    }

    pub fn check<S: SolutionState>(&self, w: &S, w_n: &S, observer: &dyn Observer) -> SteadyCheck {
        let unsteadiness = unsteadiness(w, w_n);
        observer.emit(&SimEvent::Unsteadiness {
            value: unsteadiness,
        });
        SteadyCheck {
            unsteadiness,
            steady: unsteadiness < self.relative_tolerance,
        }
    }
}

/// `||w - w_n|| / ||w_n||`.
///
/// With a zero previous state the result is 0 if nothing changed and
/// infinite otherwise.
pub fn unsteadiness<S: SolutionState>(w: &S, w_n: &S) -> Real {
    let change = w.l2_distance(w_n);
    let reference = w_n.l2_norm();
    if reference > FLOAT_EQUALITY_TOLERANCE {
        change / reference
    } else if change > FLOAT_EQUALITY_TOLERANCE {
        Real::INFINITY
    } else {
        0.0
    }
}
