//! Configuration of [`ShootingPlanner`](super::ShootingPlanner).
use crate::error::ForesightError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::{BufReader, Write},
    path::Path,
    str::FromStr,
};

/// Search strategy of the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// One round of sampling, the best candidate wins.
    Random,

    /// Cross-entropy method.
    Cem,

    /// Model-predictive path integral.
    Mppi,
}

impl FromStr for SolverKind {
    type Err = ForesightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "cem" => Ok(Self::Cem),
            "mppi" => Ok(Self::Mppi),
            _ => Err(ForesightError::Config(format!("unknown solver: {}", s))),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Cem => write!(f, "cem"),
            Self::Mppi => write!(f, "mppi"),
        }
    }
}

/// Fills the step vacated when a warm-start sequence is shifted forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    /// Average of the remaining steps.
    Mean,

    /// Zeros.
    Zero,

    /// Repeat of the previous last step.
    Constant,
}

impl FromStr for DefaultAction {
    type Err = ForesightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "zero" => Ok(Self::Zero),
            "constant" => Ok(Self::Constant),
            _ => Err(ForesightError::Config(format!("unknown default action: {}", s))),
        }
    }
}

/// Configuration of [`ShootingPlanner`](super::ShootingPlanner).
///
/// ```rust
/// use foresight_core::shooting::{ShootingConfig, SolverKind};
///
/// let config = ShootingConfig::default()
///     .solver(SolverKind::Cem)
///     .horizon(15)
///     .num_samples(200)
///     .num_elites(20);
/// assert!(config.check().is_ok());
/// assert!(config.clone().horizon(0).check().is_err());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ShootingConfig {
    pub solver: SolverKind,

    /// Planning horizon `H`.
    pub horizon: usize,

    /// Discount factor.
    pub gamma: f32,

    /// Number of candidate sequences per iteration.
    pub num_samples: usize,

    /// Number of elites refitted by CEM. Clamped to `num_samples`.
    pub num_elites: usize,

    /// Iterations of CEM and MPPI. Random shooting always runs once.
    pub num_iter: usize,

    /// Weight of the previous distribution when refitting CEM.
    #[serde(default)]
    pub alpha: f32,

    /// Initial standard deviation as a fraction of `action_scale`.
    pub scale: f32,

    /// Actions are clipped to `[-action_scale, action_scale]`.
    pub action_scale: f32,

    /// Start from the previous plan shifted by one step.
    pub warm_start: bool,

    pub default_action: DefaultAction,

    /// Inverse temperature of MPPI weights.
    pub kappa: f32,

    /// FIR coefficients smoothing MPPI noise over time. The first weights the
    /// current step.
    pub filter_coefficients: Vec<f32>,

    /// Threads evaluating candidates.
    pub num_cpu: usize,

    /// Sample next states from probabilistic models instead of using the mean.
    #[serde(default)]
    pub sample_next_state: bool,
}

impl Default for ShootingConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::Cem,
            horizon: 20,
            gamma: 1.0,
            num_samples: 400,
            num_elites: 40,
            num_iter: 5,
            alpha: 0.0,
            scale: 0.3,
            action_scale: 1.0,
            warm_start: true,
            default_action: DefaultAction::Zero,
            kappa: 1.0,
            filter_coefficients: vec![0.25, 0.8, 0.0],
            num_cpu: 1,
            sample_next_state: false,
        }
    }
}

impl ShootingConfig {
    pub fn solver(mut self, v: SolverKind) -> Self {
        self.solver = v;
        self
    }

    pub fn horizon(mut self, v: usize) -> Self {
        self.horizon = v;
        self
    }

    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    pub fn num_samples(mut self, v: usize) -> Self {
        self.num_samples = v;
        self
    }

    pub fn num_elites(mut self, v: usize) -> Self {
        self.num_elites = v;
        self
    }

    pub fn num_iter(mut self, v: usize) -> Self {
        self.num_iter = v;
        self
    }

    pub fn alpha(mut self, v: f32) -> Self {
        self.alpha = v;
        self
    }

    pub fn scale(mut self, v: f32) -> Self {
        self.scale = v;
        self
    }

    pub fn action_scale(mut self, v: f32) -> Self {
        self.action_scale = v;
        self
    }

    pub fn warm_start(mut self, v: bool) -> Self {
        self.warm_start = v;
        self
    }

    pub fn default_action(mut self, v: DefaultAction) -> Self {
        self.default_action = v;
        self
    }

    pub fn kappa(mut self, v: f32) -> Self {
        self.kappa = v;
        self
    }

    pub fn filter_coefficients(mut self, v: Vec<f32>) -> Self {
        self.filter_coefficients = v;
        self
    }

    pub fn num_cpu(mut self, v: usize) -> Self {
        self.num_cpu = v;
        self
    }

    pub fn sample_next_state(mut self, v: bool) -> Self {
        self.sample_next_state = v;
        self
    }

    /// Number of elites actually used.
    pub fn effective_num_elites(&self) -> usize {
        self.num_elites.min(self.num_samples)
    }

    /// Validates the configuration.
    pub fn check(&self) -> Result<()> {
        let err = |msg: String| -> Result<()> { Err(ForesightError::config(msg)) };
        if self.horizon == 0 {
            return err("horizon must be positive".into());
        }
        if self.num_samples == 0 {
            return err("num_samples must be positive".into());
        }
        if self.num_iter == 0 {
            return err("num_iter must be positive".into());
        }
        if self.num_elites == 0 {
            return err("num_elites must be positive".into());
        }
        if self.num_cpu == 0 {
            return err("num_cpu must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return err(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return err(format!("alpha must be in [0, 1), got {}", self.alpha));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return err(format!("scale must be positive, got {}", self.scale));
        }
        if !(self.action_scale.is_finite() && self.action_scale > 0.0) {
            return err(format!("action_scale must be positive, got {}", self.action_scale));
        }
        if self.solver == SolverKind::Mppi {
            if !(self.kappa.is_finite() && self.kappa > 0.0) {
                return err(format!("kappa must be positive, got {}", self.kappa));
            }
            match self.filter_coefficients.first() {
                None => return err("filter_coefficients must not be empty".into()),
                Some(b0) if !(*b0 > 0.0) => {
                    return err(format!("first filter coefficient must be positive, got {}", b0))
                }
                _ => {}
            }
            if self
                .filter_coefficients
                .iter()
                .any(|b| !(b.is_finite() && *b >= 0.0))
            {
                return err(format!(
                    "filter coefficients must be non-negative, got {:?}",
                    self.filter_coefficients
                ));
            }
        }
        Ok(())
    }

    /// Constructs [`ShootingConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of shooting planner from {:?}", path_);
        Ok(b)
    }

    /// Saves [`ShootingConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of shooting planner into {:?}", path_);
        Ok(())
    }
}
