//! Batched containers for distortion parameters and 2D points.
//!
//! [`DistortionParams`] stores one parameter set per column of a
//! `channels × batch` matrix, [`Points2D`] stores one point per column of a
//! `2 × N` matrix. Both are immutable value types; the distortion models
//! always return freshly built batches.

use std::fmt;

use nalgebra::{DMatrix, DVector, Matrix2xX, Vector2};

use crate::distortion::DistortionError;

/// A batch of 2D points, one point per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Points2D {
    data: Matrix2xX<f64>,
}

impl Points2D {
    /// Builds a batch from separate x and y coordinate arrays.
    ///
    /// # Errors
    ///
    /// [`DistortionError::ShapeMismatch`] if the arrays differ in length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lens_distortion::geometry::Points2D;
    ///
    /// let points = Points2D::from_coords(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
    /// assert_eq!(points.len(), 2);
    /// assert_eq!(points.point(1).y, 4.0);
    /// ```
    pub fn from_coords(xs: &[f64], ys: &[f64]) -> Result<Self, DistortionError> {
        if xs.len() != ys.len() {
            return Err(DistortionError::ShapeMismatch(format!(
                "{} x coordinates but {} y coordinates",
                xs.len(),
                ys.len()
            )));
        }
        let data = Matrix2xX::from_fn(xs.len(), |row, col| if row == 0 { xs[col] } else { ys[col] });
        Ok(Points2D { data })
    }

    /// A batch holding the single point `(x, y)`.
    pub fn from_xy(x: f64, y: f64) -> Self {
        Points2D {
            data: Matrix2xX::from_column_slice(&[x, y]),
        }
    }

    /// Wraps the packed `2 × N` representation directly.
    pub fn from_data(data: Matrix2xX<f64>) -> Self {
        Points2D { data }
    }

    pub fn from_points(points: &[Vector2<f64>]) -> Self {
        Points2D {
            data: Matrix2xX::from_fn(points.len(), |row, col| points[col][row]),
        }
    }

    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ncols() == 0
    }

    /// The x coordinates of every point.
    pub fn x(&self) -> DVector<f64> {
        self.data.row(0).transpose()
    }

    /// The y coordinates of every point.
    pub fn y(&self) -> DVector<f64> {
        self.data.row(1).transpose()
    }

    /// The `index`-th point. Panics if out of range, like matrix indexing.
    pub fn point(&self, index: usize) -> Vector2<f64> {
        self.data.column(index).into_owned()
    }

    pub fn iter(&self) -> impl Iterator<Item = Vector2<f64>> + '_ {
        self.data.column_iter().map(|column| column.into_owned())
    }

    pub fn data(&self) -> &Matrix2xX<f64> {
        &self.data
    }

    pub fn into_data(self) -> Matrix2xX<f64> {
        self.data
    }

    /// Element-wise `self - other` for two batches of the same length.
    pub fn difference(&self, other: &Points2D) -> Result<Points2D, DistortionError> {
        if self.len() != other.len() {
            return Err(DistortionError::ShapeMismatch(format!(
                "cannot subtract {} points from {} points",
                other.len(),
                self.len()
            )));
        }
        Ok(Points2D {
            data: &self.data - &other.data,
        })
    }

    /// Euclidean norm of every point, e.g. of a residual batch.
    pub fn norms(&self) -> Vec<f64> {
        self.iter().map(|point| point.norm()).collect()
    }
}

impl fmt::Display for Points2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "x: {:?}\ny: {:?}", self.data[(0, 0)], self.data[(1, 0)])
        } else {
            write!(
                f,
                "x: {:?}\ny: {:?}",
                self.data.row(0).iter().collect::<Vec<_>>(),
                self.data.row(1).iter().collect::<Vec<_>>()
            )
        }
    }
}

/// A batch of model parameters, one parameter set per column.
///
/// Rows are the named scalars of a model (e.g. `fx, fy, cx, cy` for the
/// affine model), columns are batch elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionParams {
    data: DMatrix<f64>,
}

impl DistortionParams {
    /// A batch holding the single parameter set `values`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lens_distortion::geometry::DistortionParams;
    ///
    /// let params = DistortionParams::new(&[1.0, 2.0, 3.0, 4.0]);
    /// assert_eq!(params.channels(), 4);
    /// assert_eq!(params.batch_len(), 1);
    /// ```
    pub fn new(values: &[f64]) -> Self {
        DistortionParams {
            data: DMatrix::from_column_slice(values.len(), 1, values),
        }
    }

    /// Wraps a `channels × batch` matrix directly.
    pub fn from_batch(data: DMatrix<f64>) -> Self {
        DistortionParams { data }
    }

    /// Builds a batch from one parameter set per entry of `sets`.
    ///
    /// # Errors
    ///
    /// * [`DistortionError::InvalidParams`] if `sets` is empty.
    /// * [`DistortionError::ShapeMismatch`] if the sets differ in length.
    pub fn from_rows(sets: &[Vec<f64>]) -> Result<Self, DistortionError> {
        let channels = sets
            .first()
            .map(|set| set.len())
            .ok_or_else(|| DistortionError::InvalidParams("Empty parameter batch".to_string()))?;
        if let Some(bad) = sets.iter().position(|set| set.len() != channels) {
            return Err(DistortionError::ShapeMismatch(format!(
                "parameter set {} has {} values, expected {}",
                bad,
                sets[bad].len(),
                channels
            )));
        }
        let data = DMatrix::from_fn(channels, sets.len(), |row, col| sets[col][row]);
        Ok(DistortionParams { data })
    }

    /// Number of scalars per parameter set.
    pub fn channels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of parameter sets.
    pub fn batch_len(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// The parameter set used for output element `index`.
    ///
    /// A batch of one is broadcast to every index. Callers must have checked
    /// that `channels() == N`.
    pub fn coefficients<const N: usize>(&self, index: usize) -> [f64; N] {
        let col = if self.batch_len() == 1 { 0 } else { index };
        std::array::from_fn(|row| self.data[(row, col)])
    }
}

/// Generate a grid of sample points evenly distributed over a rectangle
///
/// The rectangle spans `[-half_width, half_width] × [-half_height, half_height]`
/// in normalized image coordinates, and each point sits at the center of its
/// grid cell.
///
/// # Arguments
///
/// * `half_width` - Half extent of the rectangle along x
/// * `half_height` - Half extent of the rectangle along y
/// * `n` - The approximate number of points to generate
///
/// An empty batch is returned when `n` is zero or either extent is not a
/// finite positive number.
pub fn sample_points(half_width: f64, half_height: f64, n: usize) -> Points2D {
    let valid_extent = |e: f64| e.is_finite() && e > 0.0;
    if n == 0 || !valid_extent(half_width) || !valid_extent(half_height) {
        return Points2D::from_points(&[]);
    }

    let width = 2.0 * half_width;
    let height = 2.0 * half_height;

    // Calculate the number of cells in each dimension, at most n per axis
    let num_cells_x = ((n as f64 * (width / height)).sqrt().round() as usize).clamp(1, n);
    let num_cells_y = ((n as f64 * (height / width)).sqrt().round() as usize).clamp(1, n);

    let cell_width = width / num_cells_x as f64;
    let cell_height = height / num_cells_y as f64;

    let Some(capacity) = num_cells_x.checked_mul(num_cells_y) else {
        return Points2D::from_points(&[]);
    };
    let mut points = Vec::with_capacity(capacity);
    for i in 0..num_cells_y {
        for j in 0..num_cells_x {
            let x = (j as f64 + 0.5) * cell_width - half_width;
            let y = (i as f64 + 0.5) * cell_height - half_height;
            points.push(Vector2::new(x, y));
        }
    }

    Points2D::from_points(&points)
}
