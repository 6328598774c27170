//! Loading and saving lens configurations as YAML.
//!
//! A configuration names a model, holds one parameter set for it and the
//! Newton settings used by iterative inverses:
//!
//! ```yaml
//! lens0:
//!   distortion_model: brown_conrady
//!   distortion: [-0.28340811, 0.07395907, 0.00019359, 1.76187114e-05, 0.0, 0.0, 0.0, 0.0]
//!   max_iterations: 50
//!   tolerance: 1.0e-12
//! ```
//!
//! `max_iterations` and `tolerance` are optional and default to
//! [`NewtonConfig::default`].

use std::fs;
use std::io::Write;

use log::debug;
use serde::{Deserialize, Serialize};
use yaml_rust::{Yaml, YamlLoader};

use crate::distortion::{validation, DistortionError, DistortionModel, ModelKind};
use crate::geometry::DistortionParams;
use crate::solver::NewtonConfig;

/// One lens entry; serializes to the `lens0` mapping shown above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    /// Which distortion model the parameters belong to.
    #[serde(rename = "distortion_model")]
    pub model: ModelKind,
    /// One parameter set, in the model's storage order.
    #[serde(rename = "distortion")]
    pub params: Vec<f64>,
    /// Settings for iterative inverses.
    #[serde(flatten)]
    pub solver: NewtonConfig,
}

impl LensConfig {
    /// Creates a configuration with default solver settings.
    ///
    /// # Errors
    ///
    /// [`DistortionError::InvalidParams`] if `params` does not have the
    /// length `model` expects.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lens_distortion::config::LensConfig;
    /// use lens_distortion::distortion::{DistortionModel, ModelKind};
    ///
    /// let config = LensConfig::new(ModelKind::Affine, vec![500.0, 500.0, 320.0, 240.0]).unwrap();
    /// assert_eq!(config.model().name(), "affine");
    ///
    /// assert!(LensConfig::new(ModelKind::BrownConrady, vec![0.1, 0.01]).is_err());
    /// ```
    pub fn new(model: ModelKind, params: Vec<f64>) -> Result<Self, DistortionError> {
        let config = LensConfig {
            model,
            params,
            solver: NewtonConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DistortionError> {
        validation::validate_num_params(
            &self.params(),
            self.model.num_params(),
            &self.model.to_string(),
        )?;
        self.solver.validate()
    }

    /// The model, wired to this configuration's solver settings.
    pub fn model(&self) -> Box<dyn DistortionModel> {
        self.model.build_with(self.solver)
    }

    /// The parameter set as a batch of one.
    pub fn params(&self) -> DistortionParams {
        DistortionParams::new(&self.params)
    }

    /// Loads a lens configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// * [`DistortionError::IOError`]: If there's an issue reading the file.
    /// * [`DistortionError::YamlError`]: If the YAML content is malformed.
    /// * [`DistortionError::InvalidParams`]: If required keys are missing,
    ///   values have the wrong type, the model is unknown or the parameter
    ///   count does not match the model.
    pub fn load_from_yaml(path: &str) -> Result<Self, DistortionError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;

        if docs.is_empty() {
            return Err(DistortionError::InvalidParams(
                "Empty YAML document".to_string(),
            ));
        }

        let lens = &docs[0]["lens0"];

        let model: ModelKind = lens["distortion_model"]
            .as_str()
            .ok_or_else(|| {
                DistortionError::InvalidParams("Missing distortion_model".to_string())
            })?
            .parse()?;

        let distortion_yaml = lens["distortion"].as_vec().ok_or_else(|| {
            DistortionError::InvalidParams("Missing distortion parameters".to_string())
        })?;
        let params = distortion_yaml
            .iter()
            .enumerate()
            .map(|(i, value)| {
                yaml_number(value).ok_or_else(|| {
                    DistortionError::InvalidParams(format!(
                        "Invalid distortion parameter at index {}",
                        i
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let mut solver = NewtonConfig::default();
        if !lens["max_iterations"].is_badvalue() {
            let max_iterations = lens["max_iterations"]
                .as_i64()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    DistortionError::InvalidParams(
                        "Invalid max_iterations: not a non-negative integer".to_string(),
                    )
                })?;
            solver.max_iterations = max_iterations as usize;
        }
        if !lens["tolerance"].is_badvalue() {
            solver.tolerance = yaml_number(&lens["tolerance"]).ok_or_else(|| {
                DistortionError::InvalidParams("Invalid tolerance: not a number".to_string())
            })?;
        }

        let config = LensConfig {
            model,
            params,
            solver,
        };

        config.validate()?;
        debug!("Loaded {} lens configuration from {}", config.model, path);

        Ok(config)
    }

    /// Saves the configuration to a YAML file in the layout read by
    /// [`LensConfig::load_from_yaml`].
    ///
    /// # Errors
    ///
    /// * [`DistortionError::YamlError`]: If serialization fails.
    /// * [`DistortionError::IOError`]: If the file cannot be created or written.
    pub fn save_to_yaml(&self, path: &str) -> Result<(), DistortionError> {
        let lens =
            serde_yaml::to_value(self).map_err(|e| DistortionError::YamlError(e.to_string()))?;

        let mut root = serde_yaml::Mapping::new();
        root.insert(serde_yaml::Value::String("lens0".to_string()), lens);

        let yaml_string = serde_yaml::to_string(&serde_yaml::Value::Mapping(root))
            .map_err(|e| DistortionError::YamlError(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }
}

/// Reads a YAML scalar as `f64`; integers such as `0` count as numbers.
fn yaml_number(value: &Yaml) -> Option<f64> {
    match value {
        Yaml::Real(_) => value.as_f64(),
        Yaml::Integer(n) => Some(*n as f64),
        _ => None,
    }
}
