//! Implements the Brown-Conrady (plumb-bob) lens distortion model.
//!
//! The model combines radial distortion, including the rational extension
//! with a denominator polynomial, and tangential (decentering) distortion.
//! It operates on normalized image coordinates and adheres to the
//! [`DistortionModel`] trait through the `project` / `unproject` pair.
//!
//! For a point `(x, y)` with `r² = x² + y²`:
//!
//! ```text
//! radial = (1 + k1·r² + k2·r⁴ + k3·r⁶) / (1 + k4·r² + k5·r⁴ + k6·r⁶)
//! xd = x·radial + 2·p1·x·y + p2·(r² + 2x²)
//! yd = y·radial + p1·(r² + 2y²) + 2·p2·x·y
//! ```
//!
//! The forward direction is closed form. The inverse has no closed form for
//! general coefficients and is solved per point with Newton's method
//! ([`crate::solver::newton_solve_2d`]) using the analytic [`jacobian`].

use log::debug;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::distortion::{map_broadcast, validation, DistortionError, DistortionModel, Operation};
use crate::geometry::{DistortionParams, Points2D};
use crate::solver::{newton_solve_2d, NewtonConfig, SolveReport};

pub const MODEL_NAME: &str = "brown_conrady";

/// Parameters per batch element: `[k1, k2, p1, p2, k3, k4, k5, k6]`.
pub const NUM_PARAMS: usize = 8;

/// The 8 Brown-Conrady coefficients, addressed by name.
///
/// * `k1`, `k2`, `k3`: radial numerator coefficients.
/// * `p1`, `p2`: tangential coefficients.
/// * `k4`, `k5`, `k6`: radial denominator coefficients (rational model);
///   all zero gives the classic 5-parameter plumb-bob model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConradyCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

impl BrownConradyCoefficients {
    /// Reads coefficients in the storage order `[k1, k2, p1, p2, k3, k4, k5, k6]`.
    pub fn from_array(values: &[f64; NUM_PARAMS]) -> Self {
        let [k1, k2, p1, p2, k3, k4, k5, k6] = *values;
        BrownConradyCoefficients {
            k1,
            k2,
            p1,
            p2,
            k3,
            k4,
            k5,
            k6,
        }
    }

    pub fn to_array(&self) -> [f64; NUM_PARAMS] {
        [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
        ]
    }
}

/// Applies distortion to a single normalized point.
pub fn project_point(c: &BrownConradyCoefficients, point: &Vector2<f64>) -> Vector2<f64> {
    let x = point.x;
    let y = point.y;

    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let radial_num = 1.0 + c.k1 * r2 + c.k2 * r4 + c.k3 * r6;
    let radial_den = 1.0 / (1.0 + c.k4 * r2 + c.k5 * r4 + c.k6 * r6);

    let a1 = 2.0 * x * y;
    let a2 = r2 + 2.0 * x * x;
    let a3 = r2 + 2.0 * y * y;

    let xd = x * radial_num * radial_den + c.p1 * a1 + c.p2 * a2;
    let yd = y * radial_num * radial_den + c.p1 * a3 + c.p2 * a1;

    Vector2::new(xd, yd)
}

/// Analytic Jacobian `∂(xd, yd) / ∂(x, y)` of [`project_point`].
///
/// With `N(r²)`, `D(r²)` the radial numerator and denominator polynomials,
/// `g = N / D` and `g' = (N'·D − N·D') / D²` its derivative in `r²`:
///
/// ```text
/// ∂xd/∂x = g + 2x²·g' + 2·p1·y + 6·p2·x
/// ∂xd/∂y = 2xy·g' + 2·p1·x + 2·p2·y
/// ∂yd/∂x = ∂xd/∂y
/// ∂yd/∂y = g + 2y²·g' + 6·p1·y + 2·p2·x
/// ```
pub fn jacobian(c: &BrownConradyCoefficients, point: &Vector2<f64>) -> Matrix2<f64> {
    let x = point.x;
    let y = point.y;

    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let num = 1.0 + c.k1 * r2 + c.k2 * r4 + c.k3 * r6;
    let den = 1.0 + c.k4 * r2 + c.k5 * r4 + c.k6 * r6;
    let d_num = c.k1 + 2.0 * c.k2 * r2 + 3.0 * c.k3 * r4;
    let d_den = c.k4 + 2.0 * c.k5 * r2 + 3.0 * c.k6 * r4;

    let g = num / den;
    let d_g = (d_num * den - num * d_den) / (den * den);

    let dxd_dx = g + 2.0 * x * x * d_g + 2.0 * c.p1 * y + 6.0 * c.p2 * x;
    let cross = 2.0 * x * y * d_g + 2.0 * c.p1 * x + 2.0 * c.p2 * y;
    let dyd_dy = g + 2.0 * y * y * d_g + 6.0 * c.p1 * y + 2.0 * c.p2 * x;

    Matrix2::new(dxd_dx, cross, cross, dyd_dy)
}

/// Recovers the undistorted point whose projection is `target`.
///
/// Newton's method starts from `target` itself (the zero-distortion guess).
pub fn unproject_point(
    c: &BrownConradyCoefficients,
    target: &Vector2<f64>,
    config: &NewtonConfig,
) -> (Vector2<f64>, SolveReport) {
    newton_solve_2d(
        |p| project_point(c, p) - target,
        |p| jacobian(c, p),
        *target,
        config,
    )
}

/// Brown-Conrady radial + tangential distortion with parameters
/// `[k1, k2, p1, p2, k3, k4, k5, k6]`.
///
/// Only `project` and `unproject` are supported; `distort` and `undistort`
/// return [`DistortionError::UnsupportedOperation`].
///
/// A zero rational denominator is not trapped: the affected outputs are
/// `inf`/`NaN`.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{BrownConradyTransform, DistortionModel};
/// use lens_distortion::geometry::{DistortionParams, Points2D};
///
/// let model = BrownConradyTransform::default();
/// let params = DistortionParams::new(&[-0.28, 0.07, 2e-4, 2e-5, 0.0, 0.0, 0.0, 0.0]);
/// let ideal = Points2D::from_coords(&[0.1, -0.3], &[0.2, 0.25]).unwrap();
///
/// let distorted = model.project(&params, &ideal).unwrap();
/// let recovered = model.unproject(&params, &distorted).unwrap();
///
/// for (a, b) in ideal.iter().zip(recovered.iter()) {
///     assert!((a - b).norm() < 1e-9);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrownConradyTransform {
    /// Settings of the Newton solve used by `unproject`.
    pub solver: NewtonConfig,
}

impl BrownConradyTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver(solver: NewtonConfig) -> Self {
        BrownConradyTransform { solver }
    }

    /// Like [`DistortionModel::unproject`], plus one [`SolveReport`] per
    /// output point.
    ///
    /// # Errors
    ///
    /// * [`DistortionError::InvalidParams`] for a parameter count other than 8
    ///   or an invalid solver configuration.
    /// * [`DistortionError::ShapeMismatch`] for non-broadcastable batches.
    pub fn unproject_with_report(
        &self,
        params: &DistortionParams,
        points: &Points2D,
    ) -> Result<(Points2D, Vec<SolveReport>), DistortionError> {
        validation::validate_num_params(params, NUM_PARAMS, MODEL_NAME)?;
        self.solver.validate()?;

        let mut reports = Vec::with_capacity(points.len().max(params.batch_len()));
        let undistorted = map_broadcast::<NUM_PARAMS, _>(params, points, |coeffs, target| {
            let c = BrownConradyCoefficients::from_array(coeffs);
            let (estimate, report) = unproject_point(&c, target, &self.solver);
            reports.push(report);
            estimate
        })?;

        let failed = reports.iter().filter(|r| !r.is_converged()).count();
        if failed > 0 {
            debug!(
                "{} of {} points did not converge within {} Newton iterations",
                failed,
                reports.len(),
                self.solver.max_iterations
            );
        }

        Ok((undistorted, reports))
    }
}

impl DistortionModel for BrownConradyTransform {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn num_params(&self) -> usize {
        NUM_PARAMS
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Project | Operation::Unproject)
    }

    fn project(
        &self,
        params: &DistortionParams,
        points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        validation::validate_num_params(params, NUM_PARAMS, MODEL_NAME)?;
        map_broadcast::<NUM_PARAMS, _>(params, points, |coeffs, point| {
            project_point(&BrownConradyCoefficients::from_array(coeffs), point)
        })
    }

    /// Inverts [`DistortionModel::project`] point by point.
    ///
    /// Points whose solve does not converge still get the last estimate; use
    /// [`BrownConradyTransform::unproject_with_report`] to see which.
    fn unproject(
        &self,
        params: &DistortionParams,
        points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        self.unproject_with_report(params, points)
            .map(|(undistorted, _)| undistorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::sample_points;
    use crate::solver::SolveStatus;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// EuRoC cam0 plumb-bob calibration
    fn plumb_bob() -> BrownConradyCoefficients {
        BrownConradyCoefficients {
            k1: -0.28340811,
            k2: 0.07395907,
            p1: 0.00019359,
            p2: 1.76187114e-05,
            ..Default::default()
        }
    }

    fn rational() -> BrownConradyCoefficients {
        BrownConradyCoefficients {
            k1: 0.12,
            k2: -0.035,
            p1: 0.0012,
            p2: -0.0021,
            k3: 0.004,
            k4: 0.05,
            k5: 0.002,
            k6: 0.0001,
        }
    }

    fn numeric_jacobian(c: &BrownConradyCoefficients, p: &Vector2<f64>) -> Matrix2<f64> {
        let h = 1e-6;
        let dx = Vector2::new(h, 0.0);
        let dy = Vector2::new(0.0, h);
        let col_x = (project_point(c, &(p + dx)) - project_point(c, &(p - dx))) / (2.0 * h);
        let col_y = (project_point(c, &(p + dy)) - project_point(c, &(p - dy))) / (2.0 * h);
        Matrix2::from_columns(&[col_x, col_y])
    }

    #[test]
    fn test_coefficients_array_order() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let c = BrownConradyCoefficients::from_array(&values);
        assert_eq!(c.k1, 1.0);
        assert_eq!(c.k2, 2.0);
        assert_eq!(c.p1, 3.0);
        assert_eq!(c.p2, 4.0);
        assert_eq!(c.k3, 5.0);
        assert_eq!(c.k6, 8.0);
        assert_eq!(c.to_array(), values);
    }

    #[test]
    fn test_zero_coefficients_are_identity() {
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&[0.0; NUM_PARAMS]);
        let points = sample_points(2.0, 1.5, 50);
        let projected = model.project(&params, &points).unwrap();
        assert_eq!(projected, points);
    }

    #[test]
    fn test_project_known_value() {
        // Radial only: x·(1 + k1·r²) with r² = 0.25
        let c = BrownConradyCoefficients {
            k1: 0.1,
            ..Default::default()
        };
        let distorted = project_point(&c, &Vector2::new(0.3, 0.4));
        assert_relative_eq!(distorted.x, 0.3 * 1.025, epsilon = 1e-15);
        assert_relative_eq!(distorted.y, 0.4 * 1.025, epsilon = 1e-15);

        // Tangential only
        let c = BrownConradyCoefficients {
            p1: 0.01,
            p2: 0.02,
            ..Default::default()
        };
        let distorted = project_point(&c, &Vector2::new(0.3, 0.4));
        // a1 = 0.24, a2 = 0.25 + 0.18, a3 = 0.25 + 0.32
        assert_relative_eq!(distorted.x, 0.3 + 0.01 * 0.24 + 0.02 * 0.43, epsilon = 1e-15);
        assert_relative_eq!(distorted.y, 0.4 + 0.01 * 0.57 + 0.02 * 0.24, epsilon = 1e-15);
    }

    #[test]
    fn test_project_is_deterministic() {
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&rational().to_array());
        let points = sample_points(0.7, 0.5, 40);
        let first = model.project(&params, &points).unwrap();
        let second = model.project(&params, &points).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
        }
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let points = [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.3, -0.2),
            Vector2::new(-0.45, 0.35),
            Vector2::new(0.6, 0.5),
            Vector2::new(-0.1, -0.7),
        ];
        for c in [plumb_bob(), rational()] {
            for p in &points {
                let analytic = jacobian(&c, p);
                let numeric = numeric_jacobian(&c, p);
                assert_abs_diff_eq!(analytic, numeric, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_jacobian_at_center_is_identity() {
        let j = jacobian(&rational(), &Vector2::zeros());
        assert_relative_eq!(j, Matrix2::identity(), epsilon = 1e-15);
    }

    #[test]
    fn test_unproject_roundtrip_plumb_bob() {
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&plumb_bob().to_array());
        let ideal = sample_points(0.6, 0.45, 80);

        let distorted = model.project(&params, &ideal).unwrap();
        let (recovered, reports) = model.unproject_with_report(&params, &distorted).unwrap();

        assert_eq!(reports.len(), ideal.len());
        for ((a, b), report) in ideal.iter().zip(recovered.iter()).zip(&reports) {
            assert!(report.is_converged(), "{:?} at {:?}", report, a);
            assert_relative_eq!(a.x, b.x, epsilon = 1e-6);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unproject_roundtrip_rational() {
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&rational().to_array());
        let ideal = sample_points(0.8, 0.6, 80);

        let distorted = model.project(&params, &ideal).unwrap();
        let recovered = model.unproject(&params, &distorted).unwrap();

        let residual = recovered.difference(&ideal).unwrap();
        for norm in residual.norms() {
            assert!(norm < 1e-6, "round trip error {}", norm);
        }
    }

    #[test]
    fn test_unproject_fixed_budget_matches_default() {
        let params = DistortionParams::new(&plumb_bob().to_array());
        let distorted = BrownConradyTransform::new()
            .project(&params, &Points2D::from_xy(0.35, -0.25))
            .unwrap();

        let checked = BrownConradyTransform::new()
            .unproject(&params, &distorted)
            .unwrap();
        let (fixed, reports) = BrownConradyTransform::with_solver(NewtonConfig::fixed_budget(50))
            .unproject_with_report(&params, &distorted)
            .unwrap();

        // A zero tolerance only stops early on an exactly zero residual
        assert!(reports[0].residual < 1e-12);
        assert_ne!(reports[0].status, SolveStatus::SingularJacobian);
        assert_abs_diff_eq!(checked.point(0), fixed.point(0), epsilon = 1e-12);
    }

    #[test]
    fn test_unproject_beyond_fold_radius_does_not_converge() {
        init_logger();
        // With k1 = -1, xd = x - x³ peaks at 2/(3√3) ≈ 0.385 and a target of
        // 0.5 has no nearby preimage.
        let c = BrownConradyCoefficients {
            k1: -1.0,
            ..Default::default()
        };
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&c.to_array());
        let (_, reports) = model
            .unproject_with_report(&params, &Points2D::from_xy(0.5, 0.0))
            .unwrap();

        assert!(!reports[0].is_converged());
        assert_eq!(reports[0].status, SolveStatus::SingularJacobian);

        // Inside the fold radius the same model inverts fine
        let ideal = Points2D::from_xy(0.3, 0.1);
        let distorted = model.project(&params, &ideal).unwrap();
        let (recovered, reports) = model.unproject_with_report(&params, &distorted).unwrap();
        assert!(reports[0].is_converged());
        assert_abs_diff_eq!(recovered.point(0), ideal.point(0), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_denominator_propagates_non_finite() {
        let c = BrownConradyCoefficients {
            k4: -1.0,
            ..Default::default()
        };
        let params = DistortionParams::new(&c.to_array());
        let projected = BrownConradyTransform::new()
            .project(&params, &Points2D::from_xy(1.0, 0.0))
            .unwrap();
        assert!(projected.point(0).x.is_infinite());
        assert!(projected.point(0).y.is_nan());

        let (_, reports) = BrownConradyTransform::new()
            .unproject_with_report(&params, &Points2D::from_xy(f64::INFINITY, 0.0))
            .unwrap();
        assert_eq!(reports[0].status, SolveStatus::Diverged);
    }

    #[test]
    fn test_parameter_batch_broadcasting() {
        let model = BrownConradyTransform::new();
        let params =
            DistortionParams::from_rows(&[plumb_bob().to_array().to_vec(), vec![0.0; 8]]).unwrap();
        let point = Points2D::from_xy(0.2, 0.3);

        let projected = model.project(&params, &point).unwrap();
        assert_eq!(projected.len(), 2);
        assert_eq!(
            projected.point(0),
            project_point(&plumb_bob(), &Vector2::new(0.2, 0.3))
        );
        assert_eq!(projected.point(1), Vector2::new(0.2, 0.3));

        let recovered = model.unproject(&params, &projected).unwrap();
        assert_abs_diff_eq!(recovered.point(0), Vector2::new(0.2, 0.3), epsilon = 1e-9);
        assert_abs_diff_eq!(recovered.point(1), Vector2::new(0.2, 0.3), epsilon = 1e-15);
    }

    #[test]
    fn test_invalid_inputs() {
        let model = BrownConradyTransform::new();
        let short = DistortionParams::new(&[0.1, 0.01, 0.0, 0.0, 0.0]);
        assert!(matches!(
            model.project(&short, &Points2D::from_xy(0.1, 0.1)),
            Err(DistortionError::InvalidParams(_))
        ));

        let bad_solver = BrownConradyTransform::with_solver(NewtonConfig {
            max_iterations: 10,
            tolerance: -1.0,
        });
        let params = DistortionParams::new(&[0.0; NUM_PARAMS]);
        assert!(matches!(
            bad_solver.unproject(&params, &Points2D::from_xy(0.1, 0.1)),
            Err(DistortionError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_distort_undistort_unsupported() {
        let model = BrownConradyTransform::new();
        let params = DistortionParams::new(&[0.0; NUM_PARAMS]);
        let points = Points2D::from_xy(0.1, 0.1);
        assert_eq!(
            model.distort(&params, &points),
            Err(DistortionError::UnsupportedOperation {
                model: MODEL_NAME,
                operation: Operation::Distort,
            })
        );
        assert_eq!(
            model.undistort(&params, &points),
            Err(DistortionError::UnsupportedOperation {
                model: MODEL_NAME,
                operation: Operation::Undistort,
            })
        );
    }
}
