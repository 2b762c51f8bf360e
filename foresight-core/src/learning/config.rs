//! Configuration of [`ModelLearning`](super::ModelLearning).
use crate::{error::ForesightError, replay_buffer::DEFAULT_BOOTSTRAP_PROB};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ModelLearning`](super::ModelLearning).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ModelLearningConfig {
    /// Probability that a collected transition goes to the validation set.
    pub validation_ratio: f64,

    /// Passes over the train buffer per trajectory. Zero disables fitting.
    pub num_epochs: usize,

    pub batch_size: usize,

    /// Capacity of each of the train and validation buffers.
    pub max_memory: usize,

    /// Draw bootstrap masks for ensemble heads.
    pub bootstrap: bool,

    #[serde(default = "default_bootstrap_prob")]
    pub bootstrap_prob: f64,

    /// Rescale the variance of probabilistic dynamics on the validation set.
    pub calibrate: bool,
}

fn default_bootstrap_prob() -> f64 {
    DEFAULT_BOOTSTRAP_PROB
}

impl Default for ModelLearningConfig {
    fn default() -> Self {
        Self {
            validation_ratio: 0.1,
            num_epochs: 1,
            batch_size: 100,
            max_memory: 10_000,
            bootstrap: true,
            bootstrap_prob: DEFAULT_BOOTSTRAP_PROB,
            calibrate: true,
        }
    }
}

impl ModelLearningConfig {
    pub fn validation_ratio(mut self, v: f64) -> Self {
        self.validation_ratio = v;
        self
    }

    pub fn num_epochs(mut self, v: usize) -> Self {
        self.num_epochs = v;
        self
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    pub fn max_memory(mut self, v: usize) -> Self {
        self.max_memory = v;
        self
    }

    pub fn bootstrap(mut self, v: bool) -> Self {
        self.bootstrap = v;
        self
    }

    pub fn bootstrap_prob(mut self, v: f64) -> Self {
        self.bootstrap_prob = v;
        self
    }

    pub fn calibrate(mut self, v: bool) -> Self {
        self.calibrate = v;
        self
    }

    /// Fails on values out of range.
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.validation_ratio) {
            return Err(ForesightError::config(format!(
                "validation_ratio must be in [0, 1], got {}",
                self.validation_ratio
            )));
        }
        if self.batch_size == 0 {
            return Err(ForesightError::config("batch_size must be positive"));
        }
        if self.max_memory == 0 {
            return Err(ForesightError::config("max_memory must be positive"));
        }
        Ok(())
    }

    /// Loads [`ModelLearningConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of model learning from {:?}", path_);
        Ok(b)
    }

    /// Saves [`ModelLearningConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of model learning into {:?}", path_);
        Ok(())
    }
}
