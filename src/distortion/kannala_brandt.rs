//! Placeholder for the Kannala-Brandt (k1..k4) fisheye model.
//!
//! The type exists so that fisheye lenses share the [`DistortionModel`]
//! interface with the other families. No operation is implemented; each one
//! returns [`crate::distortion::DistortionError::UnsupportedOperation`].

use crate::distortion::{DistortionModel, Operation};

pub const MODEL_NAME: &str = "kannala_brandt_k3";

/// Parameters per batch element: `[k1, k2, k3, k4]`.
pub const NUM_PARAMS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KannalaBrandtK3Transform;

impl DistortionModel for KannalaBrandtK3Transform {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn num_params(&self) -> usize {
        NUM_PARAMS
    }

    fn supports(&self, _operation: Operation) -> bool {
        false
    }
}
