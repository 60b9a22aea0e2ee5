//! One-dimensional melting slab.
//!
//! Nondimensional energy equation with a regularized solid fraction:
//!
//! ```text
//! theta_t = theta_xx + (1 / Ste) * d(phi_s(theta)) / dt
//! phi_s(theta) = 0.5 * (1 + tanh((theta_s - theta) / r_s))
//! ```
//!
//! on `0 <= x <= 1`, backward Euler in time, second-order central
//! differences in space, hot wall at `x = 0` and cold wall at `x = 1`.

use nalgebra::{DMatrix, DVector};
use pf_sim::StepSolver;

use crate::error::{MeltError, MeltResult};
use crate::newton::{NewtonConfig, newton_solve};

/// Smoothing of the solid/liquid transition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Regularization {
    /// Temperature at which the material is half solid.
    pub theta_s: f64,
    /// Width of the transition.
    pub r_s: f64,
}

impl Default for Regularization {
    fn default() -> Self {
        Self {
            theta_s: 0.1,
            r_s: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeltParams {
    /// Grid points including both walls.
    pub nodes: usize,
    /// Stefan number.
    pub ste: f64,
    pub regularization: Regularization,
}

impl Default for MeltParams {
    fn default() -> Self {
        Self {
            nodes: 41,
            ste: 1.0,
            regularization: Regularization::default(),
        }
    }
}

/// Dirichlet wall temperatures.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Walls {
    pub hot: f64,
    pub cold: f64,
}

impl Default for Walls {
    fn default() -> Self {
        Self {
            hot: 1.0,
            cold: -0.1,
        }
    }
}

/// Summary of the last Newton solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    pub residual_norm: f64,
}

/// Melting slab with a relaxed Newton solve per time step.
#[derive(Clone, Debug)]
pub struct MeltSlab {
    params: MeltParams,
    newton: NewtonConfig,
    last_report: Option<SolveReport>,
}

impl MeltSlab {
    pub fn new(params: MeltParams, newton: NewtonConfig) -> MeltResult<Self> {
        if params.nodes < 3 {
            return Err(MeltError::InvalidParam {
                what: "nodes must be at least 3",
            });
        }
        if params.ste.is_nan() || params.ste <= 0.0 {
            return Err(MeltError::InvalidParam {
                what: "ste must be positive",
            });
        }
        if params.regularization.r_s.is_nan() || params.regularization.r_s <= 0.0 {
            return Err(MeltError::InvalidParam {
                what: "regularization r_s must be positive",
            });
        }
        newton.validate()?;
        Ok(Self {
            params,
            newton,
            last_report: None,
        })
    }

    pub fn params(&self) -> &MeltParams {
        &self.params
    }

    pub fn newton(&self) -> &NewtonConfig {
        &self.newton
    }

    /// Swap the Newton settings, e.g. to relax them after a divergence.
    pub fn set_newton(&mut self, newton: NewtonConfig) -> MeltResult<()> {
        newton.validate()?;
        self.newton = newton;
        Ok(())
    }

    pub fn last_report(&self) -> Option<SolveReport> {
        self.last_report
    }

    pub fn spacing(&self) -> f64 {
        1.0 / (self.params.nodes - 1) as f64
    }

    /// Cold material with a thin hot layer next to the hot wall.
    pub fn initial_state(&self, walls: &Walls, hot_width: f64) -> DVector<f64> {
        let h = self.spacing();
        DVector::from_fn(self.params.nodes, |i, _| {
            if (i as f64) * h < hot_width {
                walls.hot
            } else {
                walls.cold
            }
        })
    }

    /// Regularized solid fraction.
    pub fn solid_fraction(&self, theta: f64) -> f64 {
        let reg = self.params.regularization;
        0.5 * (1.0 + ((reg.theta_s - theta) / reg.r_s).tanh())
    }

    fn solid_fraction_slope(&self, theta: f64) -> f64 {
        let reg = self.params.regularization;
        let t = ((reg.theta_s - theta) / reg.r_s).tanh();
        -0.5 * (1.0 - t * t) / reg.r_s
    }

    /// Position where the solid fraction first reaches one half, measured
    /// from the hot wall; `1.0` once everything has melted.
    pub fn melt_front(&self, theta: &DVector<f64>) -> f64 {
        let h = self.spacing();
        let liquid = |v: f64| self.solid_fraction(v) < 0.5;
        for i in 1..theta.len() {
            if liquid(theta[i - 1]) && !liquid(theta[i]) {
                let ts = self.params.regularization.theta_s;
                let span = theta[i - 1] - theta[i];
                let frac = if span.abs() > f64::EPSILON {
                    (theta[i - 1] - ts) / span
                } else {
                    0.0
                };
                return ((i - 1) as f64 + frac.clamp(0.0, 1.0)) * h;
            }
            if !liquid(theta[i - 1]) {
                return (i - 1) as f64 * h;
            }
        }
        1.0
    }

    fn residual(&self, theta: &DVector<f64>, theta_n: &DVector<f64>, dt: f64, walls: &Walls) -> DVector<f64> {
        let n = theta.len();
        let inv_h2 = 1.0 / (self.spacing() * self.spacing());
        let ste = self.params.ste;
        DVector::from_fn(n, |i, _| {
            if i == 0 {
                theta[0] - walls.hot
            } else if i == n - 1 {
                theta[n - 1] - walls.cold
            } else {
                let storage = (theta[i] - theta_n[i]) / dt;
                let latent = (self.solid_fraction(theta[i]) - self.solid_fraction(theta_n[i]))
                    / (ste * dt);
                let diffusion = (theta[i - 1] - 2.0 * theta[i] + theta[i + 1]) * inv_h2;
                storage - latent - diffusion
            }
        })
    }

    fn jacobian(&self, theta: &DVector<f64>, dt: f64) -> DMatrix<f64> {
        let n = theta.len();
        let inv_h2 = 1.0 / (self.spacing() * self.spacing());
        let ste = self.params.ste;
        let mut jac = DMatrix::zeros(n, n);
        jac[(0, 0)] = 1.0;
        jac[(n - 1, n - 1)] = 1.0;
        for i in 1..n - 1 {
            jac[(i, i - 1)] = -inv_h2;
            jac[(i, i)] = 1.0 / dt - self.solid_fraction_slope(theta[i]) / (ste * dt) + 2.0 * inv_h2;
            jac[(i, i + 1)] = -inv_h2;
        }
        jac
    }
}

impl StepSolver for MeltSlab {
    type State = DVector<f64>;
    type Boundary = Walls;

    fn solve(
        &mut self,
        dt: f64,
        w: &mut DVector<f64>,
        w_n: &DVector<f64>,
        walls: &Walls,
    ) -> bool {
        if w.len() != self.params.nodes || w_n.len() != self.params.nodes {
            tracing::error!(
                expected = self.params.nodes,
                got = w.len(),
                "state size does not match the grid"
            );
            return false;
        }

        let result = newton_solve(
            w.clone(),
            |theta| self.residual(theta, w_n, dt, walls),
            |theta| self.jacobian(theta, dt),
            &self.newton,
        );

        match result {
            Ok(res) => {
                tracing::debug!(
                    dt,
                    iterations = res.iterations,
                    residual = res.residual_norm,
                    "newton converged"
                );
                self.last_report = Some(SolveReport {
                    iterations: res.iterations,
                    residual_norm: res.residual_norm,
                });
                *w = res.x;
                true
            }
            Err(e) => {
                tracing::debug!(dt, error = %e, "newton failed");
                self.last_report = None;
                false
            }
        }
    }
}
