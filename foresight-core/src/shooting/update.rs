//! Distribution updates of CEM and MPPI.
use super::sampling::ActionDistribution;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

pub(super) fn finite_or_neg_inf(r: f32) -> f32 {
    if r.is_nan() {
        f32::NEG_INFINITY
    } else {
        r
    }
}

/// Indices of the `k` largest returns, best first. NaN ranks last and ties
/// keep the lower index first.
pub fn elite_indices(returns: ArrayView1<f32>, k: usize) -> Vec<usize> {
    let mut ixs = (0..returns.len()).collect::<Vec<_>>();
    ixs.sort_by_key(|&i| Reverse(OrderedFloat(finite_or_neg_inf(returns[i]))));
    ixs.truncate(k);
    ixs
}

/// Normalized MPPI weights `exp(kappa * (R_i - max R))`.
///
/// Constant returns give uniform weights. NaN returns get zero weight.
pub fn importance_weights(returns: ArrayView1<f32>, kappa: f32) -> Array1<f32> {
    let n = returns.len();
    let max = returns
        .iter()
        .cloned()
        .filter(|r| !r.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Array1::from_elem(n, 1.0 / n as f32);
    }
    let w = returns.mapv(|r| match r.is_nan() {
        true => 0.0,
        false => (kappa * (r - max)).exp(),
    });
    let total = w.sum();
    w / total
}

/// Refits the distribution to the elites, `new = alpha * old + (1 - alpha) * elite`
/// for both mean and variance.
pub(super) fn refit_to_elites(
    dist: &mut ActionDistribution,
    candidates: &Array3<f32>,
    elites: &[usize],
    alpha: f32,
) {
    let elite = candidates.select(Axis(0), elites);
    let Some(mean) = elite.mean_axis(Axis(0)) else {
        return;
    };
    let var = elite.var_axis(Axis(0), 0.0);
    let old_var = dist.std.mapv(|s| s * s);
    dist.mean = &dist.mean * alpha + mean * (1.0 - alpha);
    dist.std = (old_var * alpha + var * (1.0 - alpha)).mapv(f32::sqrt);
}

/// Weighted average of the candidates, `[horizon, da]`.
pub(super) fn weighted_mean(candidates: ArrayView3<f32>, weights: &Array1<f32>) -> Array2<f32> {
    let (_, h, da) = candidates.dim();
    let mut mean = Array2::zeros((h, da));
    for (c, w) in candidates.axis_iter(Axis(0)).zip(weights.iter()) {
        mean.scaled_add(*w, &c);
    }
    mean
}
