use anyhow::Result;
use foresight_core::{
    model::{FnDynamicsModel, FnRewardModel},
    shooting::{
        importance_weights, shift_sequence, DefaultAction, ShootingConfig, ShootingPlanner,
        SolverKind,
    },
    simulator::{ActionSource, Simulator},
};
use ndarray::{array, Array, Array1, Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

fn models() -> (FnDynamicsModel, FnRewardModel) {
    let dynamics = FnDynamicsModel::new(1, 1, |s, a| &s + &a);
    let reward = FnRewardModel::new(|_s, _a, s1| {
        s1.map_axis(Axis(1), |x| -x.mapv(|v| v * v).sum().sqrt())
    });
    (dynamics, reward)
}

fn cem_config() -> ShootingConfig {
    ShootingConfig::default()
        .solver(SolverKind::Cem)
        .horizon(3)
        .gamma(1.0)
        .num_samples(200)
        .num_elites(20)
        .num_iter(5)
        .action_scale(10.0)
        .scale(1.0)
}

#[test]
fn test_cem_drives_state_to_zero() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    let mut planner = ShootingPlanner::build(cem_config())?;
    let mut rng = StdRng::seed_from_u64(42);

    let (action, record) = planner.plan_with_record(&sim, array![5.0f32].view(), &mut rng)?;
    assert!(record.get_scalar("planner/best_return")? > -1.5);
    assert!((action[0] + 5.0).abs() < 1.5, "{:?}", action);

    let seq = planner.last_sequence().unwrap();
    assert!(seq[[1, 0]].abs() < 1.5, "{:?}", seq);
    assert!(seq[[2, 0]].abs() < 1.5, "{:?}", seq);
    Ok(())
}

#[test]
fn test_random_shooting_with_one_sample() -> Result<()> {
    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    let config = ShootingConfig::default()
        .solver(SolverKind::Random)
        .horizon(4)
        .num_samples(1)
        .num_elites(1)
        .scale(0.5)
        .action_scale(2.0)
        .warm_start(false);

    let mut a = ShootingPlanner::build(config.clone())?;
    let mut b = ShootingPlanner::build(config)?;
    let action_a = a.plan(&sim, array![1.0f32].view(), &mut StdRng::seed_from_u64(7))?;
    let action_b = b.plan(&sim, array![1.0f32].view(), &mut StdRng::seed_from_u64(7))?;
    assert_eq!(action_a, action_b);

    // The only candidate is the clipped zero-mean Gaussian draw.
    let mut rng = StdRng::seed_from_u64(7);
    let candidate = Array2::from_shape_fn((4, 1), |_| {
        let z: f32 = rng.sample(StandardNormal);
        (z * 0.5 * 2.0).clamp(-2.0, 2.0)
    });
    assert_eq!(a.last_sequence().unwrap(), &candidate);
    assert_eq!(action_a, candidate.row(0).to_owned());
    Ok(())
}

#[test]
fn test_cem_elite_returns_improve() -> Result<()> {
    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    let num_trials = 10;
    let mut total = Array1::<f32>::zeros(5);
    for seed in 0..num_trials {
        let mut planner = ShootingPlanner::build(cem_config())?;
        let mut rng = StdRng::seed_from_u64(seed);
        let (_, record) = planner.plan_with_record(&sim, array![5.0f32].view(), &mut rng)?;
        let elite = record.get_array1("planner/elite_mean_return")?;
        assert_eq!(elite.len(), 5);
        total += &Array1::from(elite);
    }
    let mean = total / num_trials as f32;
    for i in 1..mean.len() {
        assert!(mean[i] >= mean[i - 1] - 1e-3, "{:?}", mean);
    }
    Ok(())
}

#[test]
fn test_mppi_weights_and_mean_sequence() -> Result<()> {
    for returns in [
        Array1::zeros(7),
        array![-1e4f32, 3.0, 2.5],
        Array1::linspace(-50.0f32, 50.0, 101),
    ] {
        for kappa in [0.01, 1.0, 100.0] {
            let w = importance_weights(returns.view(), kappa);
            assert!((w.sum() - 1.0).abs() < 1e-5);
        }
    }

    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    let config = ShootingConfig::default()
        .solver(SolverKind::Mppi)
        .horizon(5)
        .num_samples(100)
        .num_iter(3)
        .kappa(1.0)
        .filter_coefficients(vec![0.2, 0.8, 0.0]);
    let mut planner = ShootingPlanner::build(config)?;
    let mut rng = StdRng::seed_from_u64(3);
    let action = planner.plan(&sim, array![0.5f32].view(), &mut rng)?;

    // MPPI executes the mean, which is also the carryover.
    assert_eq!(planner.mean(), planner.last_sequence());
    assert_eq!(action, planner.mean().unwrap().row(0).to_owned());
    assert!(action[0] < 0.0);
    Ok(())
}

#[test]
fn test_shifted_carryover_is_zero_padded() {
    let seq = Array::from_shape_fn((6, 2), |(t, j)| (t * 2 + j) as f32 + 1.0);
    let shifted = shift_sequence(seq.view(), DefaultAction::Zero);
    for t in 0..5 {
        assert_eq!(shifted.row(t), seq.row(t + 1));
    }
    assert!(shifted.row(5).iter().all(|a| *a == 0.0));
}

#[test]
fn test_parallel_evaluation_is_identical() -> Result<()> {
    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    for solver in [SolverKind::Random, SolverKind::Cem, SolverKind::Mppi] {
        let config = cem_config().solver(solver).num_samples(101);
        let mut serial = ShootingPlanner::build(config.clone().num_cpu(1))?;
        let mut parallel = ShootingPlanner::build(config.num_cpu(4))?;
        let mut rng1 = StdRng::seed_from_u64(11);
        let mut rng2 = StdRng::seed_from_u64(11);
        for state in [5.0f32, 2.0, -1.0] {
            let a1 = serial.plan(&sim, array![state].view(), &mut rng1)?;
            let a2 = parallel.plan(&sim, array![state].view(), &mut rng2)?;
            assert_eq!(a1, a2);
            assert_eq!(serial.last_sequence(), parallel.last_sequence());
        }
    }
    Ok(())
}

#[test]
fn test_simulator_matches_planner_return() -> Result<()> {
    let (dynamics, reward) = models();
    let sim = Simulator::new(&dynamics, &reward);
    let mut planner = ShootingPlanner::build(cem_config().gamma(0.9))?;
    let mut rng = StdRng::seed_from_u64(5);
    let (_, record) = planner.plan_with_record(&sim, array![5.0f32].view(), &mut rng)?;

    let seq = planner.last_sequence().unwrap().clone().insert_axis(Axis(0));
    let traj = sim.simulate(array![[5.0f32]].view(), ActionSource::Sequence(seq.view()), None)?;
    let ret = traj.discounted_returns(0.9)[0];
    assert!((ret - record.get_scalar("planner/best_return")?).abs() < 1e-4);
    Ok(())
}
