//! Policy.
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{Rng, RngCore};

/// A policy on an environment.
///
/// Policy is a mapping from a state to an action.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy {
    /// Sample an action given a state.
    fn sample(&mut self, state: ArrayView1<f32>, rng: &mut dyn RngCore) -> Result<Array1<f32>>;
}

/// A deterministic policy acting on a batch of states, used to drive
/// simulated rollouts.
pub trait BatchPolicy: Send + Sync {
    /// Returns actions `[n, da]` for `state` (`[n, ds]`).
    fn act(&self, state: ArrayView2<f32>) -> Result<Array2<f32>>;
}

/// Samples actions uniformly from `[-action_scale, action_scale]`.
///
/// Used to collect the first trajectories before a model is available.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    dim_action: usize,
    action_scale: f32,
}

impl RandomPolicy {
    pub fn new(dim_action: usize, action_scale: f32) -> Self {
        Self {
            dim_action,
            action_scale,
        }
    }
}

impl Policy for RandomPolicy {
    fn sample(&mut self, _state: ArrayView1<f32>, rng: &mut dyn RngCore) -> Result<Array1<f32>> {
        let s = self.action_scale;
        Ok(Array1::from_shape_fn(self.dim_action, |_| rng.gen_range(-s..=s)))
    }
}
