//! Configuration of [`NnDynamicsModel`](super::NnDynamicsModel).
use crate::{mlp::Activation, opt::OptimizerConfig};
use anyhow::{bail, Result};
use foresight_core::ModelKind;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`NnDynamicsModel`](super::NnDynamicsModel).
///
/// ```rust
/// use foresight_candle_model::dynamics::NnDynamicsConfig;
/// use foresight_core::ModelKind;
///
/// let config = NnDynamicsConfig::new(3, 1)
///     .kind(ModelKind::Probabilistic)
///     .num_heads(5)
///     .units(vec![64, 64]);
/// assert_eq!(config.num_heads, 5);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NnDynamicsConfig {
    pub dim_state: usize,
    pub dim_action: usize,

    /// Deterministic heads are fitted by MSE, probabilistic ones by Gaussian NLL.
    pub kind: ModelKind,

    /// Number of ensemble members.
    pub num_heads: usize,

    /// Units of hidden layers.
    pub units: Vec<usize>,

    pub activation: Activation,

    #[serde(default)]
    pub opt_config: OptimizerConfig,

    /// Maximum global norm of gradients.
    #[serde(default)]
    pub clip_grad_norm: Option<f64>,

    /// Bounds of the predicted log standard deviation in normalized units.
    pub min_log_std: f32,
    pub max_log_std: f32,
}

impl NnDynamicsConfig {
    /// Probabilistic single-head model with two hidden layers of 200 units.
    pub fn new(dim_state: usize, dim_action: usize) -> Self {
        Self {
            dim_state,
            dim_action,
            kind: ModelKind::Probabilistic,
            num_heads: 1,
            units: vec![200, 200],
            activation: Activation::Relu,
            opt_config: OptimizerConfig::default(),
            clip_grad_norm: None,
            min_log_std: -5.0,
            max_log_std: 2.0,
        }
    }

    pub fn kind(mut self, v: ModelKind) -> Self {
        self.kind = v;
        self
    }

    pub fn num_heads(mut self, v: usize) -> Self {
        self.num_heads = v;
        self
    }

    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    pub fn clip_grad_norm(mut self, v: Option<f64>) -> Self {
        self.clip_grad_norm = v;
        self
    }

    pub fn log_std_range(mut self, min: f32, max: f32) -> Self {
        self.min_log_std = min;
        self.max_log_std = max;
        self
    }

    pub(super) fn check(&self) -> Result<()> {
        if self.dim_state == 0 {
            bail!("dim_state must be positive");
        }
        if self.num_heads == 0 {
            bail!("num_heads must be positive");
        }
        if self.min_log_std >= self.max_log_std {
            bail!(
                "min_log_std ({}) must be less than max_log_std ({})",
                self.min_log_std,
                self.max_log_std
            );
        }
        Ok(())
    }

    /// Loads [`NnDynamicsConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of dynamics model from {:?}", path_);
        Ok(b)
    }

    /// Saves [`NnDynamicsConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of dynamics model into {:?}", path_);
        Ok(())
    }
}
