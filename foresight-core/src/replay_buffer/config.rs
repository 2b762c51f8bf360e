//! Configuration of [`BootstrapReplayBuffer`](super::BootstrapReplayBuffer).
use crate::error::ForesightError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Probability that a transition is included in a head's resample.
///
/// Equals the probability that a Poisson(1) count is positive, the inclusion
/// rate of the classical bootstrap.
pub const DEFAULT_BOOTSTRAP_PROB: f64 = 0.632_120_56;

/// Configuration of [`BootstrapReplayBuffer`](super::BootstrapReplayBuffer).
///
/// ```rust
/// use foresight_core::replay_buffer::BootstrapReplayBufferConfig;
///
/// let config = BootstrapReplayBufferConfig::default()
///     .capacity(5_000)
///     .num_heads(5)
///     .bootstrap(true);
/// assert_eq!(config.capacity, 5_000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BootstrapReplayBufferConfig {
    /// Maximum number of transitions. The oldest are evicted first.
    pub capacity: usize,

    /// Length of the bootstrap mask.
    pub num_heads: usize,

    /// If `false`, every mask bit is set.
    pub bootstrap: bool,

    /// Probability of setting each mask bit when bootstrapping.
    #[serde(default = "default_bootstrap_prob")]
    pub bootstrap_prob: f64,
}

fn default_bootstrap_prob() -> f64 {
    DEFAULT_BOOTSTRAP_PROB
}

impl Default for BootstrapReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            num_heads: 1,
            bootstrap: true,
            bootstrap_prob: DEFAULT_BOOTSTRAP_PROB,
        }
    }
}

impl BootstrapReplayBufferConfig {
    /// Sets the capacity of the buffer.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Sets the number of heads.
    pub fn num_heads(mut self, v: usize) -> Self {
        self.num_heads = v;
        self
    }

    /// Enables or disables bootstrap masks.
    pub fn bootstrap(mut self, v: bool) -> Self {
        self.bootstrap = v;
        self
    }

    /// Sets the inclusion probability of mask bits.
    pub fn bootstrap_prob(mut self, v: f64) -> Self {
        self.bootstrap_prob = v;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ForesightError::config("capacity must be positive"));
        }
        if self.num_heads == 0 {
            return Err(ForesightError::config("num_heads must be positive"));
        }
        if !(self.bootstrap_prob > 0.0 && self.bootstrap_prob <= 1.0) {
            return Err(ForesightError::config(format!(
                "bootstrap_prob must be in (0, 1], got {}",
                self.bootstrap_prob
            )));
        }
        Ok(())
    }

    /// Loads [`BootstrapReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of replay buffer from {:?}", path_);
        Ok(b)
    }

    /// Saves [`BootstrapReplayBufferConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of replay buffer into {:?}", path_);
        Ok(())
    }
}
