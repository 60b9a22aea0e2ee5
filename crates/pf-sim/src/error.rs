//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during transient simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Time step size {requested} is not above {epsilon}")]
    StepSizeTooSmall { requested: f64, epsilon: f64 },

    #[error("Solve did not converge at t = {time} with dt = {dt} (step size floor reached)")]
    RetryExhausted { time: f64, dt: f64 },

    #[error("Core error: {0}")]
    Core(#[from] pf_core::PfError),

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;
