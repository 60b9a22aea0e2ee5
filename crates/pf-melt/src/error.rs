//! Error types for the melting solver.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeltError {
    #[error("Invalid parameter: {what}")]
    InvalidParam { what: &'static str },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Diverged: residual {residual_norm} above {threshold}")]
    Diverged { residual_norm: f64, threshold: f64 },

    #[error("Numeric error: {what}")]
    Numeric { what: String },
}

pub type MeltResult<T> = Result<T, MeltError>;
