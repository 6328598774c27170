//! Newton's method for square 2D nonlinear systems.
//!
//! The solver is independent of any lens model: it takes a residual function
//! `f(p)` and its Jacobian `J(p)` and iterates `p ← p − J(p)⁻¹ f(p)` from an
//! initial guess. Each solve reports how it ended through [`SolveReport`]
//! instead of silently returning after a fixed number of steps.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::DistortionError;

/// Iteration budget and stopping tolerance for [`newton_solve_2d`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// Maximum number of Newton updates.
    pub max_iterations: usize,
    /// The solve stops once the residual norm is at or below this value.
    pub tolerance: f64,
}

impl NewtonConfig {
    pub const DEFAULT_MAX_ITERATIONS: usize = 50;
    pub const DEFAULT_TOLERANCE: f64 = 1e-12;

    /// Always runs `max_iterations` updates unless the residual is exactly
    /// zero, the Jacobian is singular or the iteration blows up.
    pub fn fixed_budget(max_iterations: usize) -> Self {
        NewtonConfig {
            max_iterations,
            tolerance: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), DistortionError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(DistortionError::InvalidParams(format!(
                "Newton tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

impl Default for NewtonConfig {
    fn default() -> Self {
        NewtonConfig {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// The residual norm reached the tolerance.
    Converged,
    /// The iteration budget ran out first.
    ExhaustedBudget,
    /// The residual became infinite or NaN.
    Diverged,
    /// The Jacobian could not be inverted at the current estimate.
    SingularJacobian,
}

/// Outcome of a single Newton solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Number of Newton updates applied.
    pub iterations: usize,
    /// Residual norm at the returned estimate.
    pub residual: f64,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Solve `residual(p) = 0` for `p` starting at `initial`.
///
/// The update `Δp = −J⁻¹ f` uses the closed-form 2×2 inverse. The returned
/// estimate is the last one evaluated; on [`SolveStatus::Diverged`] it is the
/// estimate whose residual was not finite.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::solver::{newton_solve_2d, NewtonConfig};
/// use nalgebra::{Matrix2, Vector2};
///
/// // x² = 2, y = 3
/// let (root, report) = newton_solve_2d(
///     |p: &Vector2<f64>| Vector2::new(p.x * p.x - 2.0, p.y - 3.0),
///     |p: &Vector2<f64>| Matrix2::new(2.0 * p.x, 0.0, 0.0, 1.0),
///     Vector2::new(1.0, 0.0),
///     &NewtonConfig::default(),
/// );
/// assert!(report.is_converged());
/// assert!((root.x - 2f64.sqrt()).abs() < 1e-12);
/// ```
pub fn newton_solve_2d<F, J>(
    residual: F,
    jacobian: J,
    initial: Vector2<f64>,
    config: &NewtonConfig,
) -> (Vector2<f64>, SolveReport)
where
    F: Fn(&Vector2<f64>) -> Vector2<f64>,
    J: Fn(&Vector2<f64>) -> Matrix2<f64>,
{
    let mut estimate = initial;

    for iteration in 0..config.max_iterations {
        let error = residual(&estimate);
        let norm = error.norm();

        if !norm.is_finite() {
            return (estimate, report(SolveStatus::Diverged, iteration, norm));
        }
        if norm <= config.tolerance {
            return (estimate, report(SolveStatus::Converged, iteration, norm));
        }

        let Some(inverse) = jacobian(&estimate).try_inverse() else {
            return (estimate, report(SolveStatus::SingularJacobian, iteration, norm));
        };

        estimate -= inverse * error;
    }

    let norm = residual(&estimate).norm();
    let status = if !norm.is_finite() {
        SolveStatus::Diverged
    } else if norm <= config.tolerance {
        SolveStatus::Converged
    } else {
        SolveStatus::ExhaustedBudget
    };

    (estimate, report(status, config.max_iterations, norm))
}

fn report(status: SolveStatus, iterations: usize, residual: f64) -> SolveReport {
    SolveReport {
        status,
        iterations,
        residual,
    }
}
