//! Configuration of [`MpcAgent`](super::MpcAgent).
use crate::{error::ForesightError, learning::ModelLearningConfig, shooting::ShootingConfig};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// How the planner treats model uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exploration {
    /// Plan on the predicted mean.
    Expected,

    /// Plan optimistically inside the `beta`-scaled confidence region of the
    /// model with hallucinated control.
    Optimistic { beta: f32 },
}

/// Configuration of [`MpcAgent`](super::MpcAgent).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MpcAgentConfig {
    pub shooting: ShootingConfig,
    pub learning: ModelLearningConfig,
    pub exploration: Exploration,
}

impl Default for MpcAgentConfig {
    fn default() -> Self {
        Self {
            shooting: ShootingConfig::default(),
            learning: ModelLearningConfig::default(),
            exploration: Exploration::Expected,
        }
    }
}

impl MpcAgentConfig {
    pub fn shooting(mut self, v: ShootingConfig) -> Self {
        self.shooting = v;
        self
    }

    pub fn learning(mut self, v: ModelLearningConfig) -> Self {
        self.learning = v;
        self
    }

    pub fn exploration(mut self, v: Exploration) -> Self {
        self.exploration = v;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.shooting.check()?;
        self.learning.check()?;
        if let Exploration::Optimistic { beta } = self.exploration {
            if !(beta >= 0.0 && beta.is_finite()) {
                return Err(ForesightError::config(format!(
                    "beta must be non-negative and finite, got {}",
                    beta
                )));
            }
        }
        Ok(())
    }

    /// Loads [`MpcAgentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of MPC agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`MpcAgentConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of MPC agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shooting::SolverKind;
    use tempdir::TempDir;

    #[test]
    fn test_serde_agent_config() -> Result<()> {
        let config = MpcAgentConfig::default()
            .shooting(ShootingConfig::default().solver(SolverKind::Mppi).horizon(8))
            .exploration(Exploration::Optimistic { beta: 1.5 });

        let dir = TempDir::new("mpc_agent_config")?;
        let path = dir.path().join("mpc_agent_config.yaml");
        config.save(&path)?;
        let config_ = MpcAgentConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_negative_beta_is_rejected() {
        let config = MpcAgentConfig::default().exploration(Exploration::Optimistic { beta: -1.0 });
        assert!(config.check().is_err());
    }
}
