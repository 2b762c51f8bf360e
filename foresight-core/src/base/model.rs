//! Interfaces of the models used for planning.
use super::{PosteriorModel, TrainableModel};
use crate::error::ForesightError;
use anyhow::Result;
use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView2, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

/// Whether a dynamics model outputs a point estimate or a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Point prediction, zero covariance.
    Deterministic,

    /// Mean and covariance.
    Probabilistic,
}

/// Next-state distribution for a batch of state-action pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `[n, dim_state]`.
    pub mean: Array2<f32>,

    /// `[n, dim_state, dim_state]`.
    pub covariance: Array3<f32>,
}

impl Prediction {
    /// Point prediction with zero covariance.
    pub fn deterministic(mean: Array2<f32>) -> Self {
        let (n, d) = mean.dim();
        Self {
            mean,
            covariance: Array3::zeros((n, d, d)),
        }
    }

    /// Prediction with diagonal covariance given by `variance` (`[n, dim_state]`).
    pub fn from_variance(mean: Array2<f32>, variance: &Array2<f32>) -> Self {
        let (n, d) = mean.dim();
        let mut covariance = Array3::zeros((n, d, d));
        for i in 0..n {
            for j in 0..d {
                covariance[[i, j, j]] = variance[[i, j]];
            }
        }
        Self { mean, covariance }
    }

    /// Diagonal of the covariance, `[n, dim_state]`.
    pub fn variance(&self) -> Array2<f32> {
        let (n, d) = self.mean.dim();
        Array2::from_shape_fn((n, d), |(i, j)| self.covariance[[i, j, j]])
    }

    pub fn len(&self) -> usize {
        self.mean.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Prediction for inputs with arbitrary leading dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedPrediction {
    /// `[..., dim_state]`.
    pub mean: ArrayD<f32>,

    /// `[..., dim_state, dim_state]`.
    pub covariance: ArrayD<f32>,
}

/// Checks that a batch of states and actions agrees with a model's dimensions.
pub fn check_inputs(
    model: &(impl DynamicsModel + ?Sized),
    state: &ArrayView2<f32>,
    action: &ArrayView2<f32>,
) -> Result<()> {
    if state.ncols() != model.dim_state() {
        return Err(ForesightError::dimension(format!(
            "state has trailing dimension {}, model expects {}",
            state.ncols(),
            model.dim_state()
        )));
    }
    if action.ncols() != model.dim_action() {
        return Err(ForesightError::dimension(format!(
            "action has trailing dimension {}, model expects {}",
            action.ncols(),
            model.dim_action()
        )));
    }
    if state.nrows() != action.nrows() {
        return Err(ForesightError::dimension(format!(
            "batch sizes of state ({}) and action ({}) differ",
            state.nrows(),
            action.nrows()
        )));
    }
    Ok(())
}

fn flatten_leading(a: &ArrayViewD<f32>, name: &str) -> Result<Array2<f32>> {
    let shape = a.shape();
    let d = *shape
        .last()
        .ok_or_else(|| ForesightError::dimension(format!("{} must have at least one axis", name)))?;
    let n = shape[..shape.len() - 1].iter().product::<usize>();
    Ok(Array2::from_shape_vec((n, d), a.iter().cloned().collect())?)
}

/// A model of state transitions.
///
/// The model owns its parameters. During a planning call it is only borrowed
/// immutably, so implementations must be [`Sync`] to allow parallel evaluation
/// of candidate action sequences.
pub trait DynamicsModel: Send + Sync {
    /// Dimension of the state.
    fn dim_state(&self) -> usize;

    /// Dimension of the action.
    fn dim_action(&self) -> usize;

    /// Deterministic or probabilistic.
    fn kind(&self) -> ModelKind;

    /// Predicts the next-state distribution for `state` (`[n, ds]`) and
    /// `action` (`[n, da]`).
    fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction>;

    /// Same as [`DynamicsModel::predict`] for inputs with extra leading dimensions,
    /// e.g., `[num_particles, horizon, ds]`.
    fn predict_batched(
        &self,
        state: ArrayViewD<f32>,
        action: ArrayViewD<f32>,
    ) -> Result<BatchedPrediction> {
        let (ss, sa) = (state.shape(), action.shape());
        if ss.len() != sa.len() || ss.is_empty() || ss[..ss.len() - 1] != sa[..sa.len() - 1] {
            return Err(ForesightError::dimension(format!(
                "leading dimensions of state {:?} and action {:?} differ",
                ss, sa
            )));
        }
        let lead = ss[..ss.len() - 1].to_vec();
        let s = flatten_leading(&state, "state")?;
        let a = flatten_leading(&action, "action")?;
        let pred = self.predict(s.view(), a.view())?;
        let d = self.dim_state();

        let mut mean_shape = lead.clone();
        mean_shape.push(d);
        let mut cov_shape = lead;
        cov_shape.extend([d, d]);

        Ok(BatchedPrediction {
            mean: pred.mean.into_shape(IxDyn(&mean_shape))?,
            covariance: pred.covariance.into_shape(IxDyn(&cov_shape))?,
        })
    }

    /// Access to gradient-based training, if the model supports it.
    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        None
    }

    /// Access to posterior updates with raw data, if the model supports it
    /// (e.g., Gaussian processes).
    fn as_posterior(&mut self) -> Option<&mut dyn PosteriorModel> {
        None
    }
}

/// Reward of transitions.
pub trait RewardModel: Send + Sync {
    /// Returns rewards `[n]` for the given batch of transitions.
    fn reward(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<f32>>;

    /// Access to training, if the reward is learned.
    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        None
    }
}

/// Predicts whether transitions end an episode.
pub trait TerminationModel: Send + Sync {
    /// Returns termination flags `[n]`.
    fn is_terminal(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<bool>>;

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        None
    }
}

/// Estimates the value of the state at the end of a simulated horizon.
pub trait TerminalReward: Send + Sync {
    /// Returns values `[n]` of `state` (`[n, ds]`).
    fn value(&self, state: ArrayView2<f32>) -> Result<Array1<f32>>;

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        None
    }
}
