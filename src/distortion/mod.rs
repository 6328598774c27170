//! Lens distortion models and their shared capability interface.
//!
//! Every model implements [`DistortionModel`]. The trait carries four
//! operations, but a model only overrides the subset it supports:
//!
//! * [`AffineTransform`]: `distort` / `undistort` (closed form both ways).
//! * [`BrownConradyTransform`]: `project` / `unproject` (closed-form forward,
//!   Newton-based inverse).
//! * [`KannalaBrandtK3Transform`]: none yet.
//!
//! Calling an operation a model does not support returns
//! [`DistortionError::UnsupportedOperation`]. [`DistortionModel::supports`]
//! lets callers discover the capability set up front.

pub mod affine;
pub mod brown_conrady;
pub mod kannala_brandt;

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix2xX, Vector2};
use serde::{Deserialize, Serialize};

use crate::geometry::{DistortionParams, Points2D};
use crate::solver::NewtonConfig;

pub use affine::AffineTransform;
pub use brown_conrady::{BrownConradyCoefficients, BrownConradyTransform};
pub use kannala_brandt::KannalaBrandtK3Transform;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DistortionError {
    #[error("Operation `{operation}` is not supported by the {model} model")]
    UnsupportedOperation {
        model: &'static str,
        operation: Operation,
    },
    #[error("Invalid distortion parameters: {0}")]
    InvalidParams(String),
    #[error("Incompatible batch shapes: {0}")]
    ShapeMismatch(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for DistortionError {
    fn from(err: std::io::Error) -> Self {
        DistortionError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for DistortionError {
    fn from(err: yaml_rust::ScanError) -> Self {
        DistortionError::YamlError(err.to_string())
    }
}

/// The four operations a distortion model may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Distort,
    Undistort,
    Project,
    Unproject,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Distort => "distort",
            Operation::Undistort => "undistort",
            Operation::Project => "project",
            Operation::Unproject => "unproject",
        };
        f.write_str(name)
    }
}

/// Trait defining the capability set shared by all distortion models.
///
/// Parameters and points are batches (see [`DistortionParams`] and
/// [`Points2D`]); the two batch lengths broadcast against each other as
/// described in [`validation::broadcast_len`]. All operations are pure.
pub trait DistortionModel: Send + Sync {
    /// Short, stable identifier of the model (used in errors and logs).
    fn name(&self) -> &'static str;

    /// Number of scalar parameters per batch element.
    fn num_params(&self) -> usize;

    /// Whether `operation` is implemented by this model.
    fn supports(&self, operation: Operation) -> bool;

    /// Map points into the distorted frame (direct reprojection semantics).
    fn distort(
        &self,
        _params: &DistortionParams,
        _points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        Err(DistortionError::UnsupportedOperation {
            model: self.name(),
            operation: Operation::Distort,
        })
    }

    /// Exact inverse of [`DistortionModel::distort`].
    fn undistort(
        &self,
        _params: &DistortionParams,
        _points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        Err(DistortionError::UnsupportedOperation {
            model: self.name(),
            operation: Operation::Undistort,
        })
    }

    /// Apply lens distortion to ideal normalized coordinates.
    fn project(
        &self,
        _params: &DistortionParams,
        _points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        Err(DistortionError::UnsupportedOperation {
            model: self.name(),
            operation: Operation::Project,
        })
    }

    /// Recover ideal normalized coordinates from distorted ones.
    fn unproject(
        &self,
        _params: &DistortionParams,
        _points: &Points2D,
    ) -> Result<Points2D, DistortionError> {
        Err(DistortionError::UnsupportedOperation {
            model: self.name(),
            operation: Operation::Unproject,
        })
    }
}

/// Tag naming one of the available models.
///
/// This is an explicit choice made by the caller (or a config file); no
/// model is ever picked automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "affine")]
    Affine,
    #[serde(rename = "brown_conrady")]
    BrownConrady,
    #[serde(rename = "kannala_brandt_k3")]
    KannalaBrandtK3,
}

impl ModelKind {
    pub fn num_params(&self) -> usize {
        match self {
            ModelKind::Affine => affine::NUM_PARAMS,
            ModelKind::BrownConrady => brown_conrady::NUM_PARAMS,
            ModelKind::KannalaBrandtK3 => kannala_brandt::NUM_PARAMS,
        }
    }

    /// Instantiate the model with its default solver settings.
    pub fn build(&self) -> Box<dyn DistortionModel> {
        self.build_with(NewtonConfig::default())
    }

    /// Instantiate the model; `solver` only matters for iterative inverses.
    pub fn build_with(&self, solver: NewtonConfig) -> Box<dyn DistortionModel> {
        match self {
            ModelKind::Affine => Box::new(AffineTransform),
            ModelKind::BrownConrady => Box::new(BrownConradyTransform::with_solver(solver)),
            ModelKind::KannalaBrandtK3 => Box::new(KannalaBrandtK3Transform),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Affine => affine::MODEL_NAME,
            ModelKind::BrownConrady => brown_conrady::MODEL_NAME,
            ModelKind::KannalaBrandtK3 => kannala_brandt::MODEL_NAME,
        };
        f.write_str(name)
    }
}

impl FromStr for ModelKind {
    type Err = DistortionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            affine::MODEL_NAME => Ok(ModelKind::Affine),
            brown_conrady::MODEL_NAME => Ok(ModelKind::BrownConrady),
            kannala_brandt::MODEL_NAME => Ok(ModelKind::KannalaBrandtK3),
            other => Err(DistortionError::InvalidParams(format!(
                "Unknown distortion model: {}",
                other
            ))),
        }
    }
}

/// Common validation functions for parameter and point batches
pub mod validation {
    use super::*;

    pub fn validate_num_params(
        params: &DistortionParams,
        expected: usize,
        model: &str,
    ) -> Result<(), DistortionError> {
        if params.channels() != expected {
            return Err(DistortionError::InvalidParams(format!(
                "{} model requires {} parameters, got {}",
                model,
                expected,
                params.channels()
            )));
        }
        Ok(())
    }

    /// Length of the output batch for `params` parameter sets and `points`
    /// points.
    ///
    /// Equal lengths pair up element-wise; a length of one is repeated
    /// against the other side. Anything else is a [`DistortionError::ShapeMismatch`].
    pub fn broadcast_len(params: usize, points: usize) -> Result<usize, DistortionError> {
        match (params, points) {
            (p, n) if p == n => Ok(n),
            (1, n) => Ok(n),
            (p, 1) => Ok(p),
            (p, n) => Err(DistortionError::ShapeMismatch(format!(
                "cannot broadcast {} parameter sets against {} points",
                p, n
            ))),
        }
    }
}

/// Evaluate `f` for every broadcast (parameter set, point) pair.
///
/// The parameter count must already have been checked against `N`.
pub(crate) fn map_broadcast<const N: usize, F>(
    params: &DistortionParams,
    points: &Points2D,
    mut f: F,
) -> Result<Points2D, DistortionError>
where
    F: FnMut(&[f64; N], &Vector2<f64>) -> Vector2<f64>,
{
    let len = validation::broadcast_len(params.batch_len(), points.len())?;
    let mut data = Matrix2xX::zeros(len);
    for i in 0..len {
        let coefficients = params.coefficients::<N>(i);
        let point = points.point(if points.len() == 1 { 0 } else { i });
        data.set_column(i, &f(&coefficients, &point));
    }
    Ok(Points2D::from_data(data))
}
