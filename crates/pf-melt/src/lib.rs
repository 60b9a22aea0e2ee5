//! Reference nonlinear step solver: a 1D melting slab.
//!
//! Implements [`pf_sim::StepSolver`] so the adaptive time stepping in
//! `pf-sim` can drive a real relaxed Newton solve.

pub mod error;
pub mod newton;
pub mod slab;

pub use error::{MeltError, MeltResult};
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
pub use slab::{MeltParams, MeltSlab, Regularization, SolveReport, Walls};
