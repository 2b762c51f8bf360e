//! Configuration of [`Trainer`](super::Trainer).
use crate::error::ForesightError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of episodes, warmup included.
    pub num_episodes: usize,

    /// Maximum number of environment steps per episode.
    pub max_steps: usize,

    /// Episodes collected with a random policy before planning starts.
    pub warmup_episodes: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_episodes: 10,
            max_steps: 200,
            warmup_episodes: 1,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of episodes.
    pub fn num_episodes(mut self, v: usize) -> Self {
        self.num_episodes = v;
        self
    }

    /// Sets the maximum number of steps per episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the number of random episodes.
    pub fn warmup_episodes(mut self, v: usize) -> Self {
        self.warmup_episodes = v;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(ForesightError::config("max_steps must be positive"));
        }
        Ok(())
    }

    /// Loads [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of trainer from {:?}", path_);
        Ok(b)
    }

    /// Saves [`TrainerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of trainer into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .num_episodes(5)
            .max_steps(50)
            .warmup_episodes(2);

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
