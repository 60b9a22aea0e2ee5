//! Relaxed Newton solver.

use crate::error::{MeltError, MeltResult};
use nalgebra::{DMatrix, DVector};

/// Newton solver configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm
    pub rel_tol: f64,
    /// Fraction of the Newton update applied per iteration, in (0, 1]
    pub relaxation: f64,
    /// Residual norm treated as divergence
    pub divergence_threshold: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-8,
            rel_tol: 1e-8,
            relaxation: 1.0,
            divergence_threshold: 1e12,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> MeltResult<()> {
        if self.max_iterations == 0 {
            return Err(MeltError::InvalidParam {
                what: "max_iterations must be positive",
            });
        }
        if self.relaxation.is_nan() || self.relaxation <= 0.0 || self.relaxation > 1.0 {
            return Err(MeltError::InvalidParam {
                what: "relaxation must be in (0, 1]",
            });
        }
        if self.divergence_threshold.is_nan() || self.divergence_threshold <= 0.0 {
            return Err(MeltError::InvalidParam {
                what: "divergence_threshold must be positive",
            });
        }
        Ok(())
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Solution vector
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
}

/// Newton iteration `x += relaxation * dx` with `J dx = -r`.
///
/// Converges when the residual norm drops below `abs_tol` or below
/// `rel_tol` times the initial norm. Fails on a non-finite or
/// above-threshold residual, a singular Jacobian, or the iteration cap.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> MeltResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    let mut x = x0;
    let mut r = residual_fn(&x);
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        check_divergence(r_norm, config)?;
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
            });
        }

        let dx = jacobian_fn(&x)
            .lu()
            .solve(&(-&r))
            .ok_or_else(|| MeltError::Numeric {
                what: "Jacobian solve failed".to_string(),
            })?;

        x.axpy(config.relaxation, &dx, 1.0);
        r = residual_fn(&x);
        r_norm = r.norm();
        tracing::trace!(iter, r_norm, "newton iteration");
    }

    check_divergence(r_norm, config)?;
    if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
        return Ok(NewtonResult {
            x,
            residual_norm: r_norm,
            iterations: config.max_iterations,
        });
    }

    Err(MeltError::ConvergenceFailed {
        what: format!(
            "Maximum iterations {} reached, residual = {}",
            config.max_iterations, r_norm
        ),
    })
}

fn check_divergence(r_norm: f64, config: &NewtonConfig) -> MeltResult<()> {
    if !r_norm.is_finite() || r_norm > config.divergence_threshold {
        return Err(MeltError::Diverged {
            residual_norm: r_norm,
            threshold: config.divergence_threshold,
        });
    }
    Ok(())
}
