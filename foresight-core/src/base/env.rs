//! Environment.
use anyhow::Result;
use ndarray::{Array1, ArrayView1};
use rand::RngCore;

/// Outcome of an environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// State after the step.
    pub next_state: Array1<f32>,

    /// Reward of the step.
    pub reward: f32,

    /// The episode ended in a terminal state.
    pub is_terminated: bool,

    /// The episode was cut off, e.g., by a time limit. Not a terminal state.
    pub is_truncated: bool,
}

/// Represents an environment with continuous states and actions.
///
/// Stochastic environments take their randomness from the random source given
/// to [`Env::reset`], so that runs are reproducible.
pub trait Env {
    /// Dimension of the state.
    fn dim_state(&self) -> usize;

    /// Dimension of the action.
    fn dim_action(&self) -> usize;

    /// Starts a new episode and returns the initial state.
    fn reset(&mut self, rng: &mut dyn RngCore) -> Result<Array1<f32>>;

    /// Performs an environment step.
    fn step(&mut self, action: ArrayView1<f32>) -> Result<Step>;
}
