//! Rollouts of a learned model.
//!
//! [`Simulator`] bundles the borrowed models needed to roll out action
//! sequences, or a policy, from a batch of initial states. It keeps no state
//! between calls.
use crate::{
    base::{BatchPolicy, DynamicsModel, RewardModel, TerminalReward, TerminationModel},
    error::ForesightError,
};
use anyhow::Result;
use log::trace;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Source of the actions taken in a simulated rollout.
pub enum ActionSource<'a> {
    /// Open-loop action sequences, `[num_particles, horizon, da]`.
    Sequence(ArrayView3<'a, f32>),

    /// Closed-loop actions from a policy.
    Policy {
        policy: &'a dyn BatchPolicy,
        horizon: usize,
    },
}

/// Result of [`Simulator::simulate`].
#[derive(Debug, Clone)]
pub struct SimulatedTrajectory {
    /// `[num_particles, horizon, ds]`.
    pub states: Array3<f32>,

    /// `[num_particles, horizon, da]`.
    pub actions: Array3<f32>,

    /// `[num_particles, horizon]`, zero after a particle terminated.
    pub rewards: Array2<f32>,

    /// `[num_particles, horizon, ds]`.
    pub next_states: Array3<f32>,

    /// `[num_particles, horizon]`, `true` from the terminating step on.
    pub dones: Array2<bool>,

    /// Value of the final state of particles still alive, zero otherwise.
    /// `None` without a terminal reward estimator.
    pub terminal_values: Option<Array1<f32>>,
}

impl SimulatedTrajectory {
    pub fn num_particles(&self) -> usize {
        self.rewards.nrows()
    }

    pub fn horizon(&self) -> usize {
        self.rewards.ncols()
    }

    /// `sum_t gamma^t r_t + gamma^H V(s_H)` for each particle.
    pub fn discounted_returns(&self, gamma: f32) -> Array1<f32> {
        let mut returns = Array1::<f32>::zeros(self.num_particles());
        let mut discount = 1.0;
        for r in self.rewards.axis_iter(Axis(1)) {
            returns.scaled_add(discount, &r);
            discount *= gamma;
        }
        if let Some(v) = &self.terminal_values {
            returns.scaled_add(discount, v);
        }
        returns
    }
}

/// Borrowed models used to roll out trajectories.
#[derive(Clone, Copy)]
pub struct Simulator<'a> {
    dynamics: &'a dyn DynamicsModel,
    reward: &'a dyn RewardModel,
    termination: Option<&'a dyn TerminationModel>,
    terminal_reward: Option<&'a dyn TerminalReward>,
}

impl<'a> Simulator<'a> {
    /// Simulator without termination and terminal reward.
    pub fn new(dynamics: &'a dyn DynamicsModel, reward: &'a dyn RewardModel) -> Self {
        Self {
            dynamics,
            reward,
            termination: None,
            terminal_reward: None,
        }
    }

    /// Sets the termination model. Without it, no particle ever terminates.
    pub fn termination(mut self, v: Option<&'a dyn TerminationModel>) -> Self {
        self.termination = v;
        self
    }

    /// Sets the estimator of the value at the end of the horizon.
    pub fn terminal_reward(mut self, v: Option<&'a dyn TerminalReward>) -> Self {
        self.terminal_reward = v;
        self
    }

    pub fn dynamics(&self) -> &'a dyn DynamicsModel {
        self.dynamics
    }

    /// Rolls out `actions` from `initial_state` (`[num_particles, ds]`).
    ///
    /// If `noise` (`[num_particles, horizon, ds]`, standard normal) is given,
    /// next states are sampled as `mean + std * noise` using the diagonal of the
    /// predicted covariance; otherwise the predicted mean is used.
    pub fn simulate(
        &self,
        initial_state: ArrayView2<f32>,
        actions: ActionSource<'_>,
        noise: Option<ArrayView3<f32>>,
    ) -> Result<SimulatedTrajectory> {
        let (n, ds) = initial_state.dim();
        let da = self.dynamics.dim_action();
        if ds != self.dynamics.dim_state() {
            return Err(ForesightError::dimension(format!(
                "initial state has dimension {}, model expects {}",
                ds,
                self.dynamics.dim_state()
            )));
        }
        let horizon = match &actions {
            ActionSource::Sequence(a) => {
                let (m, h, d) = a.dim();
                if m != n || d != da {
                    return Err(ForesightError::dimension(format!(
                        "action sequences have shape {:?}, expected [{}, _, {}]",
                        a.shape(),
                        n,
                        da
                    )));
                }
                h
            }
            ActionSource::Policy { horizon, .. } => *horizon,
        };
        if let Some(noise) = &noise {
            if noise.dim() != (n, horizon, ds) {
                return Err(ForesightError::dimension(format!(
                    "noise has shape {:?}, expected [{}, {}, {}]",
                    noise.shape(),
                    n,
                    horizon,
                    ds
                )));
            }
        }
        trace!("Simulate {} particles for {} steps", n, horizon);

        let mut states = Array3::zeros((n, horizon, ds));
        let mut actions_ = Array3::zeros((n, horizon, da));
        let mut rewards = Array2::zeros((n, horizon));
        let mut next_states = Array3::zeros((n, horizon, ds));
        let mut dones = Array2::from_elem((n, horizon), false);
        let mut alive = Array1::from_elem(n, true);
        let mut state = initial_state.to_owned();

        for t in 0..horizon {
            let action = match &actions {
                ActionSource::Sequence(a) => a.slice(s![.., t, ..]).to_owned(),
                ActionSource::Policy { policy, .. } => {
                    let a = policy.act(state.view())?;
                    if a.dim() != (n, da) {
                        return Err(ForesightError::dimension(format!(
                            "policy returned actions of shape {:?}, expected [{}, {}]",
                            a.shape(),
                            n,
                            da
                        )));
                    }
                    a
                }
            };

            let pred = self.dynamics.predict(state.view(), action.view())?;
            let mut next = match &noise {
                Some(noise) => {
                    let std = pred.variance().mapv(|v| v.max(0.0).sqrt());
                    &pred.mean + &(&std * &noise.slice(s![.., t, ..]))
                }
                None => pred.mean,
            };
            for (i, is_alive) in alive.iter().enumerate() {
                if !is_alive {
                    next.row_mut(i).assign(&state.row(i));
                }
            }

            let mut reward = self
                .reward
                .reward(state.view(), action.view(), next.view())?;
            if reward.len() != n {
                return Err(ForesightError::dimension(format!(
                    "reward model returned {} values for {} particles",
                    reward.len(),
                    n
                )));
            }
            reward.zip_mut_with(&alive, |r, is_alive| {
                if !is_alive {
                    *r = 0.0;
                }
            });

            if let Some(termination) = self.termination {
                let done = termination.is_terminal(state.view(), action.view(), next.view())?;
                if done.len() != n {
                    return Err(ForesightError::dimension(format!(
                        "termination model returned {} flags for {} particles",
                        done.len(),
                        n
                    )));
                }
                alive.zip_mut_with(&done, |a, d| *a = *a && !*d);
            }

            states.slice_mut(s![.., t, ..]).assign(&state);
            actions_.slice_mut(s![.., t, ..]).assign(&action);
            rewards.column_mut(t).assign(&reward);
            next_states.slice_mut(s![.., t, ..]).assign(&next);
            dones.column_mut(t).assign(&alive.mapv(|a| !a));
            state = next;
        }

        let terminal_values = match self.terminal_reward {
            Some(v) => {
                let mut values = v.value(state.view())?;
                values.zip_mut_with(&alive, |v, is_alive| {
                    if !is_alive {
                        *v = 0.0;
                    }
                });
                Some(values)
            }
            None => None,
        };

        Ok(SimulatedTrajectory {
            states,
            actions: actions_,
            rewards,
            next_states,
            dones,
            terminal_values,
        })
    }
}
