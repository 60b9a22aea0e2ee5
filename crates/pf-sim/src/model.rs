//! Collaborator traits: the nonlinear solve step, solution states, and
//! snapshot output.

use nalgebra::DVector;
use pf_core::Real;

use crate::error::SimResult;

/// Time marker for snapshots of rejected (diverged) candidate solutions.
pub const INVALID_TIME: Real = -1.0;

/// A discrete solution that can be compared across time levels.
///
/// `Clone` is used to reset a failed attempt back to the last accepted
/// solution and to roll the time levels forward.
pub trait SolutionState: Clone {
    /// L2 norm of the state.
    fn l2_norm(&self) -> Real;

    /// L2 norm of `self - other`.
    fn l2_distance(&self, other: &Self) -> Real;
}

impl SolutionState for DVector<f64> {
    fn l2_norm(&self) -> Real {
        self.norm()
    }

    fn l2_distance(&self, other: &Self) -> Real {
        (self - other).norm()
    }
}

impl SolutionState for Vec<f64> {
    fn l2_norm(&self) -> Real {
        self.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    fn l2_distance(&self, other: &Self) -> Real {
        self.iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl SolutionState for f64 {
    fn l2_norm(&self) -> Real {
        self.abs()
    }

    fn l2_distance(&self, other: &Self) -> Real {
        (self - other).abs()
    }
}

/// The externally supplied nonlinear solve for one time step.
///
/// `solve` must be safe to call repeatedly with shrinking `dt` on the same
/// `(w, w_n)` pair. `w` holds the initial guess on entry and the candidate
/// solution on exit; `w_n` is the last accepted solution and is read-only.
pub trait StepSolver {
    type State: SolutionState;
    /// Boundary-condition data, passed through untouched.
    type Boundary;

    /// Attempt one backward step of size `dt`; `true` when converged.
    fn solve(
        &mut self,
        dt: Real,
        w: &mut Self::State,
        w_n: &Self::State,
        bcs: &Self::Boundary,
    ) -> bool;
}

/// Destination for solution snapshots.
pub trait SnapshotSink<S> {
    /// Persist `w` as the solution at `time`.
    fn write_solution(&mut self, w: &S, time: Real) -> SimResult<()>;

    /// Persist a rejected candidate for offline inspection.
    ///
    /// Written with `time = INVALID_TIME`.
    fn write_debug(&mut self, w: &S) -> SimResult<()> {
        self.write_solution(w, INVALID_TIME)
    }

    /// Persist enough to restart from `time`.
    fn write_checkpoint(&mut self, _w: &S, _time: Real) -> SimResult<()> {
        Ok(())
    }
}

/// Drops every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl<S> SnapshotSink<S> for NullSink {
    fn write_solution(&mut self, _w: &S, _time: Real) -> SimResult<()> {
        Ok(())
    }
}

/// Keeps `(time, state)` pairs in memory.
#[derive(Clone, Debug)]
pub struct MemorySink<S> {
    pub solutions: Vec<(Real, S)>,
    pub debug: Vec<S>,
    pub checkpoints: Vec<(Real, S)>,
}

impl<S> Default for MemorySink<S> {
    fn default() -> Self {
        Self {
            solutions: Vec::new(),
            debug: Vec::new(),
            checkpoints: Vec::new(),
        }
    }
}

impl<S> MemorySink<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solution_times(&self) -> Vec<Real> {
        self.solutions.iter().map(|(t, _)| *t).collect()
    }
}

impl<S: Clone> SnapshotSink<S> for MemorySink<S> {
    fn write_solution(&mut self, w: &S, time: Real) -> SimResult<()> {
        self.solutions.push((time, w.clone()));
        Ok(())
    }

    fn write_debug(&mut self, w: &S) -> SimResult<()> {
        self.debug.push(w.clone());
        Ok(())
    }

    fn write_checkpoint(&mut self, w: &S, time: Real) -> SimResult<()> {
        self.checkpoints.push((time, w.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dvector_norms() {
        let a = DVector::from_vec(vec![3.0, 4.0]);
        let b = DVector::from_vec(vec![0.0, 4.0]);
        assert_eq!(a.l2_norm(), 5.0);
        assert_eq!(a.l2_distance(&b), 3.0);
    }

    #[test]
    fn vec_norms_match_dvector() {
        let a = vec![1.0, 2.0, 2.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(a.l2_norm(), 3.0);
        assert_eq!(a.l2_distance(&b), 8.0_f64.sqrt());
    }

    #[test]
    fn memory_sink_separates_streams() {
        let mut sink: MemorySink<f64> = MemorySink::new();
        sink.write_solution(&1.0, 0.0).unwrap();
        sink.write_debug(&2.0).unwrap();
        sink.write_checkpoint(&3.0, 0.5).unwrap();
        assert_eq!(sink.solution_times(), vec![0.0]);
        assert_eq!(sink.debug, vec![2.0]);
        assert_eq!(sink.checkpoints, vec![(0.5, 3.0)]);
    }
}
