//! Configuration of [`ExactGpModel`](super::ExactGpModel).
use crate::error::ForesightError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ExactGpModel`](super::ExactGpModel).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct GpConfig {
    pub dim_state: usize,
    pub dim_action: usize,

    /// Signal variance of the RBF kernel.
    pub output_scale: f64,

    /// Length scale of the RBF kernel, shared by all input dimensions.
    pub length_scale: f64,

    /// Variance of the Gaussian likelihood.
    pub noise: f64,

    /// Capacity of the training set, enforced by summarization.
    pub max_num_points: usize,

    /// Diagonal jitter for ill-conditioned kernel matrices.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_jitter() -> f64 {
    1e-8
}

impl GpConfig {
    /// Default hyperparameters for the given dimensions.
    pub fn new(dim_state: usize, dim_action: usize) -> Self {
        Self {
            dim_state,
            dim_action,
            output_scale: 1.0,
            length_scale: 1.0,
            noise: 1e-2,
            max_num_points: 200,
            jitter: default_jitter(),
        }
    }

    pub fn output_scale(mut self, v: f64) -> Self {
        self.output_scale = v;
        self
    }

    pub fn length_scale(mut self, v: f64) -> Self {
        self.length_scale = v;
        self
    }

    pub fn noise(mut self, v: f64) -> Self {
        self.noise = v;
        self
    }

    pub fn max_num_points(mut self, v: usize) -> Self {
        self.max_num_points = v;
        self
    }

    pub fn jitter(mut self, v: f64) -> Self {
        self.jitter = v;
        self
    }

    pub(super) fn check(&self) -> Result<()> {
        if self.dim_state == 0 {
            return Err(ForesightError::config("dim_state must be positive"));
        }
        for (name, v) in [
            ("output_scale", self.output_scale),
            ("length_scale", self.length_scale),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ForesightError::config(format!("{} must be positive, got {}", name, v)));
            }
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(ForesightError::config(format!(
                "noise must be non-negative, got {}",
                self.noise
            )));
        }
        if self.max_num_points == 0 {
            return Err(ForesightError::config("max_num_points must be positive"));
        }
        Ok(())
    }

    /// Constructs [`GpConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of GP from {:?}", path_);
        Ok(b)
    }

    /// Saves [`GpConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of GP into {:?}", path_);
        Ok(())
    }
}
