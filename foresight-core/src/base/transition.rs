//! Transitions, trajectories and column-stacked batches.
use crate::error::ForesightError;
use anyhow::Result;
use ndarray::{s, Array1, Array2};

/// A single environment transition `(state, action, reward, next_state, done)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State before taking the action.
    pub state: Array1<f32>,

    /// Action taken.
    pub action: Array1<f32>,

    /// Reward received.
    pub reward: f32,

    /// State after taking the action.
    pub next_state: Array1<f32>,

    /// `true` if the episode terminated at this transition.
    pub done: bool,
}

impl Transition {
    /// Creates a transition.
    ///
    /// Fails with [`ForesightError::Dimension`] if `state` and `next_state`
    /// have different lengths.
    pub fn new(
        state: Array1<f32>,
        action: Array1<f32>,
        reward: f32,
        next_state: Array1<f32>,
        done: bool,
    ) -> Result<Self> {
        if state.len() != next_state.len() {
            return Err(ForesightError::dimension(format!(
                "state has {} elements but next_state has {}",
                state.len(),
                next_state.len()
            )));
        }
        Ok(Self {
            state,
            action,
            reward,
            next_state,
            done,
        })
    }

    /// Dimension of the state.
    pub fn dim_state(&self) -> usize {
        self.state.len()
    }

    /// Dimension of the action.
    pub fn dim_action(&self) -> usize {
        self.action.len()
    }
}

/// An ordered, immutable sequence of transitions collected in one episode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory(Vec<Transition>);

impl Trajectory {
    /// Creates a trajectory, checking that all transitions share dimensions.
    pub fn new(transitions: Vec<Transition>) -> Result<Self> {
        if let Some(first) = transitions.first() {
            let (ds, da) = (first.dim_state(), first.dim_action());
            for (i, t) in transitions.iter().enumerate() {
                if t.dim_state() != ds || t.dim_action() != da {
                    return Err(ForesightError::dimension(format!(
                        "transition {} has dims ({}, {}), expected ({}, {})",
                        i,
                        t.dim_state(),
                        t.dim_action(),
                        ds,
                        da
                    )));
                }
            }
        }
        Ok(Self(transitions))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.0.iter()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.0
    }

    /// Undiscounted sum of rewards.
    pub fn total_reward(&self) -> f32 {
        self.0.iter().map(|t| t.reward).sum()
    }

    /// Column-stacks the transitions.
    pub fn to_batch(&self) -> Result<TransitionBatch> {
        TransitionBatch::from_transitions(self.0.iter())
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Transition;
    type IntoIter = std::slice::Iter<'a, Transition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Transitions stacked along the first axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// `[n, dim_state]`.
    pub state: Array2<f32>,

    /// `[n, dim_action]`.
    pub action: Array2<f32>,

    /// `[n]`.
    pub reward: Array1<f32>,

    /// `[n, dim_state]`.
    pub next_state: Array2<f32>,

    /// `[n]`.
    pub done: Array1<bool>,
}

impl TransitionBatch {
    /// Stacks the given transitions. Fails on an empty iterator or on
    /// inconsistent dimensions.
    pub fn from_transitions<'a>(it: impl Iterator<Item = &'a Transition>) -> Result<Self> {
        let transitions = it.collect::<Vec<_>>();
        let first = transitions
            .first()
            .ok_or_else(|| ForesightError::data("cannot build a batch from no transitions"))?;
        let (n, ds, da) = (transitions.len(), first.dim_state(), first.dim_action());
        let mut state = Array2::zeros((n, ds));
        let mut action = Array2::zeros((n, da));
        let mut next_state = Array2::zeros((n, ds));
        let mut reward = Array1::zeros(n);
        let mut done = Array1::from_elem(n, false);

        for (i, t) in transitions.iter().enumerate() {
            if t.dim_state() != ds || t.dim_action() != da {
                return Err(ForesightError::dimension(format!(
                    "transition {} does not match the batch dimensions ({}, {})",
                    i, ds, da
                )));
            }
            state.row_mut(i).assign(&t.state);
            action.row_mut(i).assign(&t.action);
            next_state.row_mut(i).assign(&t.next_state);
            reward[i] = t.reward;
            done[i] = t.done;
        }

        Ok(Self {
            state,
            action,
            reward,
            next_state,
            done,
        })
    }

    pub fn len(&self) -> usize {
        self.state.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim_state(&self) -> usize {
        self.state.ncols()
    }

    pub fn dim_action(&self) -> usize {
        self.action.ncols()
    }

    /// State-action pairs concatenated along the second axis, `[n, ds + da]`.
    pub fn inputs(&self) -> Array2<f32> {
        let ds = self.dim_state();
        let mut x = Array2::zeros((self.len(), ds + self.dim_action()));
        x.slice_mut(s![.., ..ds]).assign(&self.state);
        x.slice_mut(s![.., ds..]).assign(&self.action);
        x
    }

    /// `next_state - state`.
    pub fn deltas(&self) -> Array2<f32> {
        &self.next_state - &self.state
    }

    /// Termination flags as `0.0`/`1.0`.
    pub fn done_f32(&self) -> Array1<f32> {
        self.done.mapv(|d| if d { 1.0 } else { 0.0 })
    }

    /// Returns the `i`-th transition.
    pub fn get(&self, i: usize) -> Option<Transition> {
        if i >= self.len() {
            return None;
        }
        Some(Transition {
            state: self.state.row(i).to_owned(),
            action: self.action.row(i).to_owned(),
            reward: self.reward[i],
            next_state: self.next_state.row(i).to_owned(),
            done: self.done[i],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn transition(x: f32) -> Transition {
        Transition::new(array![x, x], array![1.0], -x, array![x + 1.0, x], false).unwrap()
    }

    #[test]
    fn test_state_dims_must_agree() {
        let t = Transition::new(array![0.0, 1.0], array![0.0], 0.0, array![0.0], false);
        let e = t.unwrap_err();
        assert!(matches!(
            e.downcast_ref::<ForesightError>(),
            Some(ForesightError::Dimension(_))
        ));
    }

    #[test]
    fn test_to_batch() -> Result<()> {
        let traj = Trajectory::new(vec![transition(0.0), transition(1.0), transition(2.0)])?;
        let batch = traj.to_batch()?;

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.inputs().dim(), (3, 3));
        assert_eq!(batch.deltas().column(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(batch.deltas().column(1).to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(batch.reward.to_vec(), vec![0.0, -1.0, -2.0]);
        assert_eq!(batch.get(2), Some(transition(2.0)));
        assert_eq!(traj.total_reward(), -3.0);
        Ok(())
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        assert!(Trajectory::default().to_batch().is_err());
    }
}
