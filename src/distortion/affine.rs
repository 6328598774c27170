//! Implements the affine (scale + offset) transform.
//!
//! This is the pinhole intrinsics mapping between normalized and pixel
//! coordinates, exposed through the [`DistortionModel`] `distort` /
//! `undistort` pair. Both directions are closed form.

use nalgebra::Vector2;

use crate::distortion::{map_broadcast, validation, DistortionError, DistortionModel, Operation};
use crate::geometry::{DistortionParams, Points2D};

pub const MODEL_NAME: &str = "affine";

/// Parameters per batch element: `[fx, fy, cx, cy]`.
pub const NUM_PARAMS: usize = 4;

/// Linear scale + offset model with parameters `[fx, fy, cx, cy]`.
///
/// A zero focal scale is not trapped: `undistort` then yields `inf`/`NaN`,
/// the same way a batched array division would.
///
/// # Examples
///
/// ```rust
/// use lens_distortion::distortion::{AffineTransform, DistortionModel};
/// use lens_distortion::geometry::{DistortionParams, Points2D};
///
/// let params = DistortionParams::new(&[1.0, 2.0, 3.0, 4.0]);
/// let points = Points2D::from_xy(1.0, 2.0);
///
/// let distorted = AffineTransform.distort(&params, &points).unwrap();
/// assert_eq!(distorted.to_string(), "x: 4.0\ny: 8.0");
///
/// let undistorted = AffineTransform.undistort(&params, &points).unwrap();
/// assert_eq!(undistorted.to_string(), "x: -2.0\ny: -1.0");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffineTransform;

impl DistortionModel for AffineTransform {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn num_params(&self) -> usize {
        NUM_PARAMS
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Distort | Operation::Undistort)
    }

    /// `u = x·fx + cx`, `v = y·fy + cy`.
    fn distort(
        &self,
        params: &DistortionParams,
        points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        validation::validate_num_params(params, NUM_PARAMS, MODEL_NAME)?;
        map_broadcast::<NUM_PARAMS, _>(params, points, |&[fx, fy, cx, cy], point| {
            Vector2::new(point.x * fx + cx, point.y * fy + cy)
        })
    }

    /// `x = (u − cx) / fx`, `y = (v − cy) / fy`.
    fn undistort(
        &self,
        params: &DistortionParams,
        points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        validation::validate_num_params(params, NUM_PARAMS, MODEL_NAME)?;
        map_broadcast::<NUM_PARAMS, _>(params, points, |&[fx, fy, cx, cy], point| {
            Vector2::new((point.x - cx) / fx, (point.y - cy) / fy)
        })
    }
}
