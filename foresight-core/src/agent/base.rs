use super::{Exploration, MpcAgentConfig};
use crate::{
    base::{
        DynamicsModel, Policy, RewardModel, TerminalReward, TerminationModel, Trajectory,
    },
    learning::{ModelLearning, ModelSet},
    model::OptimisticModel,
    record::Record,
    shooting::ShootingPlanner,
    simulator::Simulator,
};
use anyhow::Result;
use ndarray::{s, Array1, ArrayView1};
use rand::RngCore;

/// Plans with a shooting method on learned models and learns the models from
/// the trajectories it collects.
///
/// The agent owns the models. Planning borrows them immutably through a
/// [`Simulator`], learning borrows them mutably through a [`ModelSet`], so the
/// two never overlap.
pub struct MpcAgent<D, R> {
    planner: ShootingPlanner,
    learning: ModelLearning,
    exploration: Exploration,
    dynamics: D,
    reward: R,
    termination: Option<Box<dyn TerminationModel>>,
    terminal_reward: Option<Box<dyn TerminalReward>>,
}

impl<D, R> MpcAgent<D, R>
where
    D: DynamicsModel,
    R: RewardModel,
{
    /// Constructs an agent. The replay buffers get one bootstrap mask bit per
    /// head of the dynamics model.
    pub fn build(config: MpcAgentConfig, mut dynamics: D, reward: R) -> Result<Self> {
        config.check()?;
        let num_heads = dynamics.as_trainable().map_or(1, |m| m.num_heads());
        Ok(Self {
            planner: ShootingPlanner::build(config.shooting)?,
            learning: ModelLearning::build(config.learning, num_heads)?,
            exploration: config.exploration,
            dynamics,
            reward,
            termination: None,
            terminal_reward: None,
        })
    }

    /// Sets the termination model.
    pub fn termination(mut self, v: impl TerminationModel + 'static) -> Self {
        self.termination = Some(Box::new(v));
        self
    }

    /// Sets the estimator of the value at the end of the planning horizon.
    pub fn terminal_reward(mut self, v: impl TerminalReward + 'static) -> Self {
        self.terminal_reward = Some(Box::new(v));
        self
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub fn reward(&self) -> &R {
        &self.reward
    }

    pub fn planner(&self) -> &ShootingPlanner {
        &self.planner
    }

    pub fn learning(&self) -> &ModelLearning {
        &self.learning
    }

    /// Forgets the warm-start carryover. Call at the start of an episode.
    pub fn reset(&mut self) {
        self.planner.reset();
    }

    /// Plans from `state` and returns the action with the planner's record.
    pub fn plan_with_record(
        &mut self,
        state: ArrayView1<f32>,
        rng: &mut dyn RngCore,
    ) -> Result<(Array1<f32>, Record)> {
        let da = self.dynamics.dim_action();
        let optimistic;
        let dynamics: &dyn DynamicsModel = match self.exploration {
            Exploration::Expected => &self.dynamics,
            Exploration::Optimistic { beta } => {
                optimistic = OptimisticModel::new(&self.dynamics, beta);
                &optimistic
            }
        };
        let simulator = Simulator::new(dynamics, &self.reward)
            .termination(self.termination.as_deref())
            .terminal_reward(self.terminal_reward.as_deref());
        let (action, record) = self.planner.plan_with_record(&simulator, state, rng)?;

        // Hallucinated inputs are not executed.
        Ok((action.slice(s![..da]).to_owned(), record))
    }

    /// Learns the models from a collected trajectory.
    pub fn learn(&mut self, trajectory: &Trajectory, rng: &mut dyn RngCore) -> Result<Record> {
        let mut models = ModelSet::new(&mut self.dynamics, &mut self.reward);
        if let Some(m) = self.termination.as_mut() {
            models = models.termination(m.as_mut());
        }
        if let Some(m) = self.terminal_reward.as_mut() {
            models = models.terminal_reward(m.as_mut());
        }
        self.learning.learn(trajectory, models, rng)
    }
}

impl<D, R> Policy for MpcAgent<D, R>
where
    D: DynamicsModel,
    R: RewardModel,
{
    fn sample(&mut self, state: ArrayView1<f32>, rng: &mut dyn RngCore) -> Result<Array1<f32>> {
        Ok(self.plan_with_record(state, rng)?.0)
    }
}
