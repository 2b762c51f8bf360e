//! Hooks used by the model-learning loop.
use super::TransitionBatch;
use crate::{error::ForesightError, record::Record};
use anyhow::Result;
use ndarray::Array1;

/// A model whose parameters are fitted by mini-batch gradient steps.
pub trait TrainableModel {
    /// Number of ensemble members, each fitted on its own bootstrap partition.
    fn num_heads(&self) -> usize {
        1
    }

    /// Updates normalization statistics with newly collected data.
    ///
    /// Called once per trajectory before fitting.
    fn update_statistics(&mut self, _batch: &TransitionBatch) -> Result<()> {
        Ok(())
    }

    /// Takes one optimization step for head `head` and returns the loss.
    fn train_step(&mut self, head: usize, batch: &TransitionBatch) -> Result<f32>;

    /// Evaluates the model on held-out data.
    fn evaluate(&self, batch: &TransitionBatch) -> Result<Record>;

    /// Sets per-dimension multipliers of the predicted variance.
    ///
    /// Only meaningful for probabilistic dynamics models.
    fn set_variance_scale(&mut self, _scale: Array1<f32>) -> Result<()> {
        Err(ForesightError::config("model does not support variance calibration"))
    }
}

/// A model updated with raw data instead of gradient steps,
/// e.g., an exact Gaussian process.
pub trait PosteriorModel {
    /// Conditions the posterior on the given transitions.
    fn add_data(&mut self, batch: &TransitionBatch) -> Result<()>;

    /// Number of points the posterior is conditioned on.
    fn num_points(&self) -> usize;

    /// Capacity of the training set.
    fn max_num_points(&self) -> usize;

    /// Compresses the training set to at most [`PosteriorModel::max_num_points`] points.
    fn summarize(&mut self) -> Result<()>;
}
