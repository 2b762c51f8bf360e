use super::{
    filter_noise, importance_weights, shift_sequence,
    sampling::ActionDistribution,
    update::{elite_indices, finite_or_neg_inf, refit_to_elites, weighted_mean},
    ShootingConfig, SolverKind,
};
use crate::{
    base::ModelKind,
    error::ForesightError,
    record::{Record, RecordValue},
    simulator::{ActionSource, Simulator},
};
use anyhow::Result;
use log::{debug, trace};
use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayView1, Axis};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use std::ops::Range;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Sampling-based trajectory optimizer.
///
/// Each call of [`ShootingPlanner::plan`] runs the following steps:
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> INIT
///     INIT --> SAMPLE: warm start or zero mean
///     SAMPLE --> EVALUATE: num_samples clipped candidates
///     EVALUATE --> UPDATE: discounted returns
///     UPDATE --> SAMPLE: iterations remain
///     UPDATE --> EXTRACT: num_iter reached
///     EXTRACT --> [*]: first action, carryover stored
/// ```
///
/// The planner owns only its search state: the warm-start carryover and the
/// distribution of the last call. Models are borrowed through a [`Simulator`]
/// for the duration of one call.
pub struct ShootingPlanner {
    config: ShootingConfig,

    /// Sequence extracted by the last call.
    carryover: Option<Array2<f32>>,

    /// Mean of the sampling distribution at the end of the last call.
    mean: Option<Array2<f32>>,

    /// Evaluates candidates when `num_cpu > 1`.
    pool: Option<ThreadPool>,
}

impl ShootingPlanner {
    /// Constructs a planner, failing on an invalid configuration.
    pub fn build(config: ShootingConfig) -> Result<Self> {
        config.check()?;
        let pool = match config.num_cpu {
            1 => None,
            n => Some(ThreadPoolBuilder::new().num_threads(n).build()?),
        };
        Ok(Self {
            config,
            carryover: None,
            mean: None,
            pool,
        })
    }

    pub fn config(&self) -> &ShootingConfig {
        &self.config
    }

    /// Forgets the warm-start carryover, e.g., at the start of an episode.
    pub fn reset(&mut self) {
        self.carryover = None;
        self.mean = None;
    }

    /// Mean of the sampling distribution after the last call, `[horizon, da]`.
    pub fn mean(&self) -> Option<&Array2<f32>> {
        self.mean.as_ref()
    }

    /// Sequence extracted by the last call, `[horizon, da]`.
    pub fn last_sequence(&self) -> Option<&Array2<f32>> {
        self.carryover.as_ref()
    }

    /// Returns the first action of the optimized sequence from `state`.
    pub fn plan(
        &mut self,
        simulator: &Simulator<'_>,
        state: ArrayView1<f32>,
        rng: &mut dyn RngCore,
    ) -> Result<Array1<f32>> {
        Ok(self.plan_with_record(simulator, state, rng)?.0)
    }

    /// Same as [`ShootingPlanner::plan`], also returning a record with
    /// `planner/elite_mean_return` (one value per iteration),
    /// `planner/best_return` and `planner/num_iter`.
    pub fn plan_with_record(
        &mut self,
        simulator: &Simulator<'_>,
        state: ArrayView1<f32>,
        rng: &mut dyn RngCore,
    ) -> Result<(Array1<f32>, Record)> {
        let dynamics = simulator.dynamics();
        let (ds, da) = (dynamics.dim_state(), dynamics.dim_action());
        if state.len() != ds {
            return Err(ForesightError::dimension(format!(
                "state has dimension {}, model expects {}",
                state.len(),
                ds
            )));
        }

        let config = &self.config;
        let (h, n) = (config.horizon, config.num_samples);
        let num_iter = match config.solver {
            SolverKind::Random => 1,
            _ => config.num_iter,
        };
        let num_elites = config.effective_num_elites();
        let sample_next_state =
            config.sample_next_state && dynamics.kind() == ModelKind::Probabilistic;

        // INIT
        let init_mean = match (&self.carryover, config.warm_start) {
            (Some(seq), true) if seq.dim() == (h, da) => {
                shift_sequence(seq.view(), config.default_action)
            }
            _ => Array2::zeros((h, da)),
        };
        let mut dist = ActionDistribution::new(init_mean, config.scale * config.action_scale);

        let mut best: Option<(f32, Array2<f32>)> = None;
        let mut elite_mean_returns = Vec::with_capacity(num_iter);

        for i in 0..num_iter {
            // SAMPLE
            let mut noise = dist.sample_noise(n, rng);
            if config.solver == SolverKind::Mppi {
                noise = filter_noise(noise.view(), &config.filter_coefficients);
            }
            let candidates = dist.candidates(&noise, config.action_scale);
            let transition_noise = match sample_next_state {
                true => Some(Array3::from_shape_fn((n, h, ds), |_| {
                    rng.sample::<f32, _>(StandardNormal)
                })),
                false => None,
            };

            // EVALUATE
            let returns = self.evaluate(simulator, state, &candidates, transition_noise.as_ref())?;
            let order = elite_indices(returns.view(), n);
            let top = order[0];
            let top_return = finite_or_neg_inf(returns[top]);
            if best.as_ref().map_or(true, |(r, _)| top_return > *r) {
                best = Some((top_return, candidates.index_axis(Axis(0), top).to_owned()));
            }
            let elites = &order[..num_elites];
            let elite_mean = elites.iter().map(|&j| returns[j]).sum::<f32>() / num_elites as f32;
            elite_mean_returns.push(elite_mean);
            trace!("Iteration {}: elite mean return {:.4}", i, elite_mean);

            // UPDATE
            match config.solver {
                SolverKind::Random => {}
                SolverKind::Cem => refit_to_elites(&mut dist, &candidates, elites, config.alpha),
                SolverKind::Mppi => {
                    let w = importance_weights(returns.view(), config.kappa);
                    dist.mean = weighted_mean(candidates.view(), &w);
                }
            }
        }

        // EXTRACT
        let (best_return, best_sequence) = match best {
            Some(b) => b,
            None => (f32::NEG_INFINITY, dist.mean.clone()),
        };
        let sequence = match config.solver {
            SolverKind::Mppi => dist.mean.clone(),
            _ => best_sequence,
        };
        let action = sequence.row(0).to_owned();
        debug!(
            "{} planner: best return {:.4} after {} iterations",
            config.solver, best_return, num_iter
        );

        let record = Record::from_slice(&[
            (
                "planner/elite_mean_return",
                RecordValue::Array1(elite_mean_returns),
            ),
            ("planner/best_return", RecordValue::Scalar(best_return)),
            ("planner/num_iter", RecordValue::Scalar(num_iter as f32)),
        ]);
        self.carryover = Some(sequence);
        self.mean = Some(dist.mean);
        Ok((action, record))
    }

    /// Discounted returns of `candidates` (`[n, horizon, da]`) rolled out from `state`.
    ///
    /// With a thread pool, contiguous slices of candidates are simulated in
    /// parallel and the returns are concatenated in order.
    fn evaluate(
        &self,
        simulator: &Simulator<'_>,
        state: ArrayView1<f32>,
        candidates: &Array3<f32>,
        noise: Option<&Array3<f32>>,
    ) -> Result<Array1<f32>> {
        let n = candidates.len_of(Axis(0));
        let gamma = self.config.gamma;
        let eval = |range: Range<usize>| -> Result<Array1<f32>> {
            let initial_state = state
                .broadcast((range.len(), state.len()))
                .ok_or_else(|| ForesightError::dimension("cannot broadcast the initial state"))?;
            let actions = candidates.slice(s![range.clone(), .., ..]);
            let noise = noise.map(|x| x.slice(s![range.clone(), .., ..]));
            let traj = simulator.simulate(initial_state, ActionSource::Sequence(actions), noise)?;
            Ok(traj.discounted_returns(gamma))
        };

        match &self.pool {
            None => eval(0..n),
            Some(pool) => {
                let num_chunks = pool.current_num_threads().min(n);
                let chunk = (n + num_chunks - 1) / num_chunks;
                let ranges = (0..n)
                    .step_by(chunk)
                    .map(|i| i..(i + chunk).min(n))
                    .collect::<Vec<_>>();
                let parts = pool.install(|| {
                    ranges
                        .into_par_iter()
                        .map(eval)
                        .collect::<Result<Vec<_>>>()
                })?;
                let views = parts.iter().map(|p| p.view()).collect::<Vec<_>>();
                Ok(concatenate(Axis(0), &views)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FnDynamicsModel, FnRewardModel};
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn models() -> (FnDynamicsModel, FnRewardModel) {
        let dynamics = FnDynamicsModel::new(1, 1, |s, a| &s + &a);
        let reward = FnRewardModel::new(|_s, _a, s1| s1.column(0).mapv(|x| -x.abs()));
        (dynamics, reward)
    }

    #[test]
    fn test_carryover_has_horizon_length() -> Result<()> {
        let (dynamics, reward) = models();
        let sim = Simulator::new(&dynamics, &reward);
        let config = ShootingConfig::default().horizon(4).num_samples(20).num_elites(5);
        let mut planner = ShootingPlanner::build(config)?;
        let mut rng = StdRng::seed_from_u64(0);

        let (action, record) = planner.plan_with_record(&sim, array![1.0f32].view(), &mut rng)?;
        let seq = planner.last_sequence().unwrap();
        assert_eq!(seq.dim(), (4, 1));
        assert_eq!(action, seq.row(0).to_owned());
        assert_eq!(record.get_array1("planner/elite_mean_return")?.len(), 5);
        assert!(action.iter().all(|a| a.abs() <= 1.0));

        planner.reset();
        assert!(planner.last_sequence().is_none());
        Ok(())
    }

    #[test]
    fn test_num_elites_above_num_samples_uses_all_samples() -> Result<()> {
        let (dynamics, reward) = models();
        let sim = Simulator::new(&dynamics, &reward);
        let config = ShootingConfig::default()
            .solver(SolverKind::Cem)
            .horizon(3)
            .num_samples(4)
            .num_elites(50);
        assert_eq!(config.effective_num_elites(), 4);
        let mut cem = ShootingPlanner::build(config.clone())?;
        let (_, record) =
            cem.plan_with_record(&sim, array![1.0f32].view(), &mut StdRng::seed_from_u64(3))?;
        let elite_means = record.get_array1("planner/elite_mean_return")?;
        assert_eq!(elite_means.len(), 5);
        assert!(elite_means.iter().all(|r| r.is_finite()));

        // Same draws, every sample an elite: the mean of all 4 returns.
        let config = config.solver(SolverKind::Random).num_elites(4);
        let mut random = ShootingPlanner::build(config)?;
        let (_, record) =
            random.plan_with_record(&sim, array![1.0f32].view(), &mut StdRng::seed_from_u64(3))?;
        let all_mean = record.get_array1("planner/elite_mean_return")?[0];
        assert!((elite_means[0] - all_mean).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_state_dimension_is_checked() -> Result<()> {
        let (dynamics, reward) = models();
        let sim = Simulator::new(&dynamics, &reward);
        let mut planner = ShootingPlanner::build(ShootingConfig::default().horizon(2))?;
        let mut rng = StdRng::seed_from_u64(0);
        let e = planner
            .plan(&sim, array![1.0f32, 2.0].view(), &mut rng)
            .unwrap_err();
        assert!(matches!(
            e.downcast_ref::<ForesightError>(),
            Some(ForesightError::Dimension(_))
        ));
        Ok(())
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        assert!(ShootingPlanner::build(ShootingConfig::default().num_samples(0)).is_err());
    }
}
