use anyhow::Result;
use candle_core::Device;
use foresight_candle_model::{
    dynamics::{NnDynamicsConfig, NnDynamicsModel},
    opt::OptimizerConfig,
    reward::{NnRewardConfig, NnRewardModel},
    termination::{NnTerminationConfig, NnTerminationModel},
    value::{NnValueConfig, NnValueFunction},
};
use foresight_core::{
    DynamicsModel, ModelKind, RewardModel, TerminalReward, TerminationModel, TrainableModel,
    Transition, TransitionBatch,
};
use ndarray::{array, Array1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempdir::TempDir;

/// Transitions of `s' = s + 0.5 a` with reward `s' + a`, terminal when `s' > 0.5`.
fn batch(n: usize, rng: &mut StdRng) -> TransitionBatch {
    let ts = (0..n)
        .map(|_| {
            let s: f32 = rng.gen_range(-1.0..1.0);
            let a: f32 = rng.gen_range(-1.0..1.0);
            let s1 = s + 0.5 * a;
            Transition::new(array![s], array![a], s1 + a, array![s1], s1 > 0.5).unwrap()
        })
        .collect::<Vec<_>>();
    TransitionBatch::from_transitions(ts.iter()).unwrap()
}

fn adam() -> OptimizerConfig {
    OptimizerConfig::Adam { lr: 1e-2 }
}

fn mse(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    (a - b).mapv(|d| d * d).mean().unwrap()
}

#[test]
fn test_deterministic_dynamics_learns_linear_system() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = StdRng::seed_from_u64(0);
    let config = NnDynamicsConfig::new(1, 1)
        .kind(ModelKind::Deterministic)
        .units(vec![32, 32])
        .opt_config(adam());
    let mut model = NnDynamicsModel::build(config, Device::Cpu)?;
    let train = batch(256, &mut rng);
    model.update_statistics(&train)?;
    for _ in 0..500 {
        model.train_step(0, &train)?;
    }

    let test = batch(100, &mut rng);
    let pred = model.predict(test.state.view(), test.action.view())?;
    let err = mse(&pred.mean.column(0).to_owned(), &test.next_state.column(0).to_owned());
    assert!(err < 0.01, "{}", err);
    assert!(pred.variance().iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn test_probabilistic_ensemble_variance_and_scale() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(1);
    let config = NnDynamicsConfig::new(1, 1)
        .num_heads(3)
        .units(vec![16])
        .opt_config(adam());
    let mut model = NnDynamicsModel::build(config, Device::Cpu)?;
    assert_eq!(model.num_heads(), 3);
    let train = batch(64, &mut rng);
    model.update_statistics(&train)?;
    for h in 0..3 {
        model.train_step(h, &train)?;
    }

    let s = array![[0.1f32], [0.2]];
    let a = array![[0.0f32], [0.5]];
    let p1 = model.predict(s.view(), a.view())?;
    assert_eq!(p1.mean.dim(), (2, 1));
    assert_eq!(p1.covariance.dim(), (2, 1, 1));
    assert!(p1.variance().iter().all(|v| *v > 0.0));
    assert_eq!(model.predict_heads(s.view(), a.view())?.len(), 3);

    model.set_variance_scale(array![2.0])?;
    let p2 = model.predict(s.view(), a.view())?;
    assert_eq!(p1.mean, p2.mean);
    for (v1, v2) in p1.variance().iter().zip(p2.variance().iter()) {
        assert!((2.0 * v1 - v2).abs() < 1e-5 * v2.max(1.0));
    }
    assert!(model.set_variance_scale(array![1.0, 1.0]).is_err());
    let record = model.evaluate(&train)?;
    assert!(record.get_scalar("loss")?.is_finite());
    for h in 0..3 {
        let std = record.get_scalar(&format!("head{}/mlp.ln0.weight_std", h))?;
        assert!(std > 0.0);
        assert!(record
            .get_scalar(&format!("head{}/mlp.ln1.bias_mean", h))?
            .is_finite());
    }
    Ok(())
}

#[test]
fn test_dynamics_save_and_load() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(2);
    let config = NnDynamicsConfig::new(1, 1).num_heads(2).units(vec![8]);
    let mut model = NnDynamicsModel::build(config.clone(), Device::Cpu)?;
    let train = batch(32, &mut rng);
    model.update_statistics(&train)?;
    model.train_step(0, &train)?;
    model.set_variance_scale(array![1.5])?;

    let dir = TempDir::new("dynamics")?;
    model.save(dir.path())?;
    let mut restored = NnDynamicsModel::build(config, Device::Cpu)?;
    restored.load(dir.path())?;

    let p1 = model.predict(train.state.view(), train.action.view())?;
    let p2 = restored.predict(train.state.view(), train.action.view())?;
    assert!((&p1.mean - &p2.mean).iter().all(|d| d.abs() < 1e-6));
    assert!((&p1.variance() - &p2.variance()).iter().all(|d| d.abs() < 1e-6));
    assert_eq!(restored.variance_scale(), &array![1.5]);
    Ok(())
}

#[test]
fn test_reward_model_learns_reward() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let config = NnRewardConfig::new(1, 1).units(vec![32]).opt_config(adam());
    let mut model = NnRewardModel::build(config, Device::Cpu)?;
    let train = batch(256, &mut rng);
    model.update_statistics(&train)?;
    for _ in 0..500 {
        model.train_step(0, &train)?;
    }

    let test = batch(100, &mut rng);
    let r = model.reward(test.state.view(), test.action.view(), test.next_state.view())?;
    let err = mse(&r, &test.reward);
    assert!(err < 0.05, "{}", err);
    Ok(())
}

#[test]
fn test_termination_model_classifies() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(4);
    let config = NnTerminationConfig::new(1, 1).units(vec![32]).opt_config(adam());
    let mut model = NnTerminationModel::build(config, Device::Cpu)?;
    let train = batch(512, &mut rng);
    model.update_statistics(&train)?;
    for _ in 0..500 {
        model.train_step(0, &train)?;
    }

    let test = batch(200, &mut rng);
    let accuracy = model.evaluate(&test)?.get_scalar("accuracy")?;
    assert!(accuracy > 0.9, "{}", accuracy);
    let done = model.is_terminal(test.state.view(), test.action.view(), test.next_state.view())?;
    assert_eq!(done.len(), 200);
    Ok(())
}

#[test]
fn test_value_function_converges_to_discounted_sum() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(5);
    let ts = (0..128)
        .map(|_| {
            let s: f32 = rng.gen_range(-1.0..1.0);
            Transition::new(array![s], array![0.0], 1.0, array![s], false).unwrap()
        })
        .collect::<Vec<_>>();
    let train = TransitionBatch::from_transitions(ts.iter())?;

    let config = NnValueConfig::new(1)
        .units(vec![16])
        .opt_config(adam())
        .gamma(0.5)
        .tau(0.1);
    let mut value = NnValueFunction::build(config, Device::Cpu)?;
    value.update_statistics(&train)?;
    for _ in 0..1000 {
        value.train_step(0, &train)?;
    }

    // 1 + 0.5 + 0.25 + ... = 2
    let v = value.value(array![[0.0f32], [0.5]].view())?;
    assert!(v.iter().all(|v| (v - 2.0).abs() < 0.3), "{:?}", v);
    Ok(())
}
