//! Collect, learn and plan.
mod config;
use crate::{
    agent::MpcAgent,
    base::{DynamicsModel, Env, Policy, RandomPolicy, RewardModel, Trajectory, Transition},
    record::{RecordValue, Recorder},
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
use rand::RngCore;

/// Runs `policy` on `env` for one episode of at most `max_steps` steps.
///
/// A transition is marked `done` only if the environment terminated; the
/// episode also stops on truncation. Errors of the environment propagate.
pub fn rollout_episode(
    env: &mut dyn Env,
    policy: &mut dyn Policy,
    max_steps: usize,
    rng: &mut dyn RngCore,
) -> Result<Trajectory> {
    let mut state = env.reset(rng)?;
    let mut transitions = Vec::with_capacity(max_steps);
    for _ in 0..max_steps {
        let action = policy.sample(state.view(), rng)?;
        let step = env.step(action.view())?;
        let stop = step.is_terminated || step.is_truncated;
        transitions.push(Transition::new(
            state,
            action,
            step.reward,
            step.next_state.clone(),
            step.is_terminated,
        )?);
        state = step.next_state;
        if stop {
            break;
        }
    }
    Trajectory::new(transitions)
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Trains an [`MpcAgent`] by alternating episodes and model learning.
///
/// ```mermaid
/// graph LR
///     A[MpcAgent]-->|action|B[Env]
///     B -->|state, reward|A
///     B -->|Trajectory|C[ModelLearning]
///     C -->|fitted models|D[ShootingPlanner]
///     D -->|plan|A
/// ```
///
/// The first `warmup_episodes` episodes are collected with a uniformly random
/// policy. After every episode the agent learns from the trajectory and a
/// record with the episode return, length and learning metrics is written.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn build(config: TrainerConfig) -> Result<Self> {
        config.check()?;
        Ok(Self { config })
    }

    /// Runs the training loop and returns the return of each episode.
    pub fn train<D, R>(
        &self,
        env: &mut dyn Env,
        agent: &mut MpcAgent<D, R>,
        recorder: &mut dyn Recorder,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f32>>
    where
        D: DynamicsModel,
        R: RewardModel,
    {
        let action_scale = agent.planner().config().action_scale;
        let mut random = RandomPolicy::new(env.dim_action(), action_scale);
        let mut returns = Vec::with_capacity(self.config.num_episodes);

        for episode in 0..self.config.num_episodes {
            agent.reset();
            let trajectory = if episode < self.config.warmup_episodes {
                rollout_episode(env, &mut random, self.config.max_steps, rng)?
            } else {
                rollout_episode(env, agent, self.config.max_steps, rng)?
            };
            let mut record = agent.learn(&trajectory, rng)?;
            let ret = trajectory.total_reward();
            info!(
                "Episode {}: return {:.3}, {} steps",
                episode,
                ret,
                trajectory.len()
            );
            record.insert("episode", RecordValue::Scalar(episode as f32));
            record.insert("return", RecordValue::Scalar(ret));
            record.insert("length", RecordValue::Scalar(trajectory.len() as f32));
            record.insert("datetime", RecordValue::DateTime(chrono::Local::now()));
            recorder.write(record);
            returns.push(ret);
        }
        Ok(returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::MpcAgentConfig,
        base::Step,
        model::{FnDynamicsModel, FnRewardModel},
        record::NullRecorder,
        shooting::ShootingConfig,
    };
    use ndarray::{array, Array1, ArrayView1};
    use rand::{rngs::StdRng, SeedableRng};

    /// Integrator on the line, terminating beyond `|x| > 3`.
    struct Line {
        x: f32,
    }

    impl Env for Line {
        fn dim_state(&self) -> usize {
            1
        }

        fn dim_action(&self) -> usize {
            1
        }

        fn reset(&mut self, _rng: &mut dyn RngCore) -> Result<Array1<f32>> {
            self.x = 0.0;
            Ok(array![self.x])
        }

        fn step(&mut self, action: ArrayView1<f32>) -> Result<Step> {
            self.x += action[0];
            Ok(Step {
                next_state: array![self.x],
                reward: self.x,
                is_terminated: self.x.abs() > 3.0,
                is_truncated: false,
            })
        }
    }

    struct Constant(f32);

    impl Policy for Constant {
        fn sample(&mut self, _state: ArrayView1<f32>, _rng: &mut dyn RngCore) -> Result<Array1<f32>> {
            Ok(array![self.0])
        }
    }

    #[test]
    fn test_rollout_stops_on_termination() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let traj = rollout_episode(&mut Line { x: 0.0 }, &mut Constant(1.0), 100, &mut rng)?;
        assert_eq!(traj.len(), 4);
        assert!(traj.iter().take(3).all(|t| !t.done));
        assert!(traj.transitions()[3].done);
        assert_eq!(traj.total_reward(), 1.0 + 2.0 + 3.0 + 4.0);

        let traj = rollout_episode(&mut Line { x: 0.0 }, &mut Constant(0.5), 3, &mut rng)?;
        assert_eq!(traj.len(), 3);
        assert!(traj.iter().all(|t| !t.done));
        Ok(())
    }

    #[test]
    fn test_train_with_known_models() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(1);
        let dynamics = FnDynamicsModel::new(1, 1, |s, a| &s + &a);
        let reward = FnRewardModel::new(|_s, _a, s1| s1.column(0).to_owned());
        let config = MpcAgentConfig::default().shooting(
            ShootingConfig::default()
                .horizon(3)
                .num_samples(50)
                .num_elites(5),
        );
        let mut agent = MpcAgent::build(config, dynamics, reward)?;
        let trainer = Trainer::build(
            TrainerConfig::default()
                .num_episodes(2)
                .max_steps(10)
                .warmup_episodes(1),
        )?;
        let returns = trainer.train(&mut Line { x: 0.0 }, &mut agent, &mut NullRecorder {}, &mut rng)?;
        assert_eq!(returns.len(), 2);

        // The planned episode walks right until it terminates beyond 3.
        assert!(returns[1] > 5.0, "{:?}", returns);
        Ok(())
    }
}
