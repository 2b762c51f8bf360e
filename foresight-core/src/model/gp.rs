//! Exact Gaussian process dynamics model.
mod config;
mod linalg;
use crate::{
    base::{check_inputs, DynamicsModel, ModelKind, PosteriorModel, Prediction, TransitionBatch},
    error::ForesightError,
};
use anyhow::Result;
pub use config::GpConfig;
use linalg::{cholesky_with_jitter, solve_lower, solve_lower_transposed};
use log::{debug, info};
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

/// Exact GP regression of the state delta `next_state - state` on the
/// state-action pair.
///
/// All output dimensions share one RBF kernel and one Gaussian likelihood, so a
/// single Cholesky factor serves every dimension. Kernel hyperparameters are
/// fixed by [`GpConfig`].
///
/// The training set is an arena capped at [`GpConfig::max_num_points`]. When
/// [`PosteriorModel::summarize`] is called above the cap, points are selected
/// greedily by maximum posterior variance of the latent function given the
/// points already selected (a pivoted Cholesky factorization of the kernel
/// matrix) and the exact posterior is recomputed from the retained points under
/// the same likelihood.
pub struct ExactGpModel {
    config: GpConfig,

    /// `[n, ds + da]`.
    inputs: Array2<f64>,

    /// `[n, ds]`.
    targets: Array2<f64>,

    /// Cholesky factor of `K + noise * I`.
    chol: Array2<f64>,

    /// `(K + noise * I)^-1 targets`.
    alpha: Array2<f64>,
}

impl ExactGpModel {
    /// Builds a GP without training points.
    pub fn build(config: GpConfig) -> Result<Self> {
        config.check()?;
        let p = config.dim_state + config.dim_action;
        let ds = config.dim_state;
        Ok(Self {
            config,
            inputs: Array2::zeros((0, p)),
            targets: Array2::zeros((0, ds)),
            chol: Array2::zeros((0, 0)),
            alpha: Array2::zeros((0, ds)),
        })
    }

    pub fn config(&self) -> &GpConfig {
        &self.config
    }

    /// Training inputs the posterior is conditioned on, `[n, ds + da]`.
    pub fn inputs(&self) -> Array2<f32> {
        self.inputs.mapv(|x| x as f32)
    }

    /// Targets of the retained points, `[n, ds]`.
    pub fn targets(&self) -> Array2<f32> {
        self.targets.mapv(|y| y as f32)
    }

    /// Latent posterior variance at the training inputs.
    pub fn training_variance(&self) -> Result<Array1<f32>> {
        let ds = self.config.dim_state;
        let x = self.inputs();
        let pred = self.predict(x.slice(s![.., ..ds]), x.slice(s![.., ds..]))?;
        Ok(pred.variance().column(0).to_owned())
    }

    /// RBF kernel matrix between the rows of `x1` and `x2`.
    fn kernel(&self, x1: &ArrayView2<f64>, x2: &ArrayView2<f64>) -> Array2<f64> {
        let l2 = self.config.length_scale * self.config.length_scale;
        let s2 = self.config.output_scale;
        Array2::from_shape_fn((x1.nrows(), x2.nrows()), |(i, j)| {
            let d2 = x1
                .row(i)
                .iter()
                .zip(x2.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>();
            s2 * (-0.5 * d2 / l2).exp()
        })
    }

    /// Recomputes the Cholesky factor and weights from the current arena.
    fn refit(&mut self) -> Result<()> {
        let n = self.inputs.nrows();
        if n == 0 {
            self.chol = Array2::zeros((0, 0));
            self.alpha = Array2::zeros((0, self.config.dim_state));
            return Ok(());
        }
        let mut k = self.kernel(&self.inputs.view(), &self.inputs.view());
        k.diag_mut().mapv_inplace(|d| d + self.config.noise);
        self.chol = cholesky_with_jitter(&k, self.config.jitter)?;
        let tmp = solve_lower(&self.chol, &self.targets.view());
        self.alpha = solve_lower_transposed(&self.chol, &tmp.view());
        Ok(())
    }

    /// Indices of up to `m` points picked by greedy maximum residual variance.
    fn select_points(&self, m: usize) -> Vec<usize> {
        let x = self.inputs.view();
        let n = x.nrows();
        let k = self.kernel(&x, &x);
        let mut residual = k.diag().to_owned();
        let mut factors: Vec<Array1<f64>> = Vec::with_capacity(m);
        let mut selected = Vec::with_capacity(m);
        let mut available = vec![true; n];

        while selected.len() < m {
            let mut best: Option<(usize, f64)> = None;
            for (j, r) in residual.iter().enumerate() {
                if available[j] && best.map_or(true, |(_, b)| *r > b) {
                    best = Some((j, *r));
                }
            }
            let (i, r) = match best {
                Some((i, r)) if r > self.config.jitter => (i, r),
                _ => break,
            };
            let pivot = r.sqrt();
            let mut l = k.row(i).to_owned();
            for f in factors.iter() {
                l.scaled_add(-f[i], f);
            }
            l /= pivot;
            residual.zip_mut_with(&l, |d, v| *d -= v * v);
            available[i] = false;
            selected.push(i);
            factors.push(l);
        }
        selected.sort_unstable();
        selected
    }
}

impl DynamicsModel for ExactGpModel {
    fn dim_state(&self) -> usize {
        self.config.dim_state
    }

    fn dim_action(&self) -> usize {
        self.config.dim_action
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Probabilistic
    }

    fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction> {
        check_inputs(self, &state, &action)?;
        let m = state.nrows();
        let ds = self.config.dim_state;
        let x = concatenate(Axis(1), &[state.view(), action.view()])?.mapv(|v| v as f64);

        if self.inputs.nrows() == 0 {
            let var = Array2::from_elem((m, ds), self.config.output_scale as f32);
            return Ok(Prediction::from_variance(state.to_owned(), &var));
        }

        let ks = self.kernel(&x.view(), &self.inputs.view());
        let delta = ks.dot(&self.alpha);
        let v = solve_lower(&self.chol, &ks.t());
        let latent_var = Array1::from_shape_fn(m, |i| {
            let q = v.column(i).iter().map(|e| e * e).sum::<f64>();
            (self.config.output_scale - q).max(0.0)
        });

        let mean = &state + &delta.mapv(|d| d as f32);
        let var = Array2::from_shape_fn((m, ds), |(i, _)| latent_var[i] as f32);
        Ok(Prediction::from_variance(mean, &var))
    }

    fn as_posterior(&mut self) -> Option<&mut dyn PosteriorModel> {
        Some(self)
    }
}

impl PosteriorModel for ExactGpModel {
    fn add_data(&mut self, batch: &TransitionBatch) -> Result<()> {
        if batch.dim_state() != self.config.dim_state || batch.dim_action() != self.config.dim_action
        {
            return Err(ForesightError::dimension(format!(
                "batch has dims ({}, {}), GP expects ({}, {})",
                batch.dim_state(),
                batch.dim_action(),
                self.config.dim_state,
                self.config.dim_action
            )));
        }
        let x = batch.inputs().mapv(|v| v as f64);
        let y = batch.deltas().mapv(|v| v as f64);
        self.inputs = concatenate(Axis(0), &[self.inputs.view(), x.view()])?;
        self.targets = concatenate(Axis(0), &[self.targets.view(), y.view()])?;
        debug!("Add {} points to GP, {} in total", batch.len(), self.inputs.nrows());
        self.refit()
    }

    fn num_points(&self) -> usize {
        self.inputs.nrows()
    }

    fn max_num_points(&self) -> usize {
        self.config.max_num_points
    }

    fn summarize(&mut self) -> Result<()> {
        let n = self.inputs.nrows();
        let m = self.config.max_num_points;
        if n <= m {
            return Ok(());
        }
        let ixs = self.select_points(m);
        self.inputs = self.inputs.select(Axis(0), &ixs);
        self.targets = self.targets.select(Axis(0), &ixs);
        info!("Summarize GP from {} to {} points", n, ixs.len());
        self.refit()
    }
}
