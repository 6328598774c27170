//! Lens Distortion Library
//!
//! Mappings between ideal (pinhole, normalized) image coordinates and the
//! distorted coordinates produced by real lenses, plus their inverses.
//! This library provides:
//! - Affine (scale + offset) transform, closed form in both directions
//! - Brown-Conrady radial/tangential model with the rational extension,
//!   inverted with Newton's method and an analytic Jacobian
//! - Kannala-Brandt placeholder sharing the same interface
//!
//! All operations work on batches: [`DistortionParams`] holds one parameter
//! set per column and [`Points2D`] one point per column; a batch of one is
//! broadcast against the other side.

pub mod config;
pub mod distortion;
pub mod geometry;
pub mod solver;

// Re-export commonly used types
pub use config::LensConfig;
pub use distortion::{
    AffineTransform, BrownConradyCoefficients, BrownConradyTransform, DistortionError,
    DistortionModel, KannalaBrandtK3Transform, ModelKind, Operation,
};
pub use geometry::{DistortionParams, Points2D};
pub use solver::{NewtonConfig, SolveReport, SolveStatus};
