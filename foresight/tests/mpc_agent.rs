#![cfg(feature = "candle")]
use anyhow::Result;
use foresight::{
    agent::{Exploration, MpcAgent, MpcAgentConfig},
    candle::{
        dynamics::{NnDynamicsConfig, NnDynamicsModel},
        opt::OptimizerConfig,
    },
    learning::ModelLearningConfig,
    model::{ExactGpModel, FnRewardModel, GpConfig},
    record::BufferedRecorder,
    shooting::{ShootingConfig, SolverKind},
    trainer::{rollout_episode, Trainer, TrainerConfig},
    Env, ModelKind, Step,
};
use ndarray::{array, Array1, ArrayView1};
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// Integrator `x' = x + a` starting at `x = 2`, rewarded by `-|x'|`.
struct Integrator {
    x: f32,
}

impl Env for Integrator {
    fn dim_state(&self) -> usize {
        1
    }

    fn dim_action(&self) -> usize {
        1
    }

    fn reset(&mut self, _rng: &mut dyn RngCore) -> Result<Array1<f32>> {
        self.x = 2.0;
        Ok(array![self.x])
    }

    fn step(&mut self, action: ArrayView1<f32>) -> Result<Step> {
        self.x += action[0].clamp(-1.0, 1.0);
        Ok(Step {
            next_state: array![self.x],
            reward: -self.x.abs(),
            is_terminated: false,
            is_truncated: false,
        })
    }
}

fn reward() -> FnRewardModel {
    FnRewardModel::new(|_s, _a, s1| s1.column(0).mapv(|x| -x.abs()))
}

fn shooting_config() -> ShootingConfig {
    ShootingConfig::default()
        .solver(SolverKind::Cem)
        .horizon(5)
        .num_samples(100)
        .num_elites(10)
        .num_iter(3)
        .action_scale(1.0)
        .scale(0.5)
}

#[test]
fn test_neural_agent_reaches_origin() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = StdRng::seed_from_u64(42);
    let dynamics = NnDynamicsModel::build(
        NnDynamicsConfig::new(1, 1)
            .kind(ModelKind::Probabilistic)
            .num_heads(3)
            .units(vec![32, 32])
            .opt_config(OptimizerConfig::Adam { lr: 1e-2 }),
        candle_core::Device::Cpu,
    )?;
    let config = MpcAgentConfig::default()
        .shooting(shooting_config())
        .learning(
            ModelLearningConfig::default()
                .validation_ratio(0.2)
                .num_epochs(200)
                .batch_size(32),
        )
        .exploration(Exploration::Expected);
    let mut agent = MpcAgent::build(config, dynamics, reward())?;

    let mut env = Integrator { x: 0.0 };
    let trainer = Trainer::build(
        TrainerConfig::default()
            .num_episodes(3)
            .max_steps(20)
            .warmup_episodes(1),
    )?;
    let mut recorder = BufferedRecorder::new();
    let returns = trainer.train(&mut env, &mut agent, &mut recorder, &mut rng)?;
    assert_eq!(returns.len(), 3);
    assert_eq!(recorder.len(), 3);
    assert!(recorder.scalars("dynamics/mse").iter().all(|v| v.is_finite()));

    agent.reset();
    let trajectory = rollout_episode(&mut env, &mut agent, 20, &mut rng)?;
    let last = trajectory.transitions().last().unwrap();
    assert!(last.next_state[0].abs() < 1.0, "{:?}", last.next_state);
    Ok(())
}

#[test]
fn test_gp_agent_with_optimistic_exploration() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let dynamics = ExactGpModel::build(
        GpConfig::new(1, 1)
            .length_scale(1.0)
            .output_scale(1.0)
            .noise(1e-3)
            .max_num_points(30),
    )?;
    let config = MpcAgentConfig::default()
        .shooting(shooting_config())
        .learning(ModelLearningConfig::default().validation_ratio(0.0))
        .exploration(Exploration::Optimistic { beta: 1.0 });
    let mut agent = MpcAgent::build(config, dynamics, reward())?;

    let mut env = Integrator { x: 0.0 };
    let trainer = Trainer::build(
        TrainerConfig::default()
            .num_episodes(3)
            .max_steps(15)
            .warmup_episodes(1),
    )?;
    let mut recorder = BufferedRecorder::new();
    trainer.train(&mut env, &mut agent, &mut recorder, &mut rng)?;

    // The GP training set never exceeds its cap.
    for n in recorder.scalars("dynamics/gp_num_inputs") {
        assert!(n <= 30.0);
    }
    Ok(())
}
