//! Calibration of predicted variances against empirical coverage.
use ndarray::{Array1, ArrayView2, Zip};
use ordered_float::OrderedFloat;

/// Pairs of central coverage probability and the matching half-width of a
/// standard normal interval.
pub const CONFIDENCE_LEVELS: [(f32, f32); 4] = [
    (0.5, 0.674_49),
    (0.682_69, 1.0),
    (0.9, 1.644_85),
    (0.95, 1.959_96),
];

const MIN_SCALE: f32 = 1e-3;

/// Absolute standardized residuals of column `j`, sorted in increasing order.
fn sorted_z(
    mean: &ArrayView2<f32>,
    variance: &ArrayView2<f32>,
    target: &ArrayView2<f32>,
    j: usize,
) -> Vec<f32> {
    let mut z = Vec::with_capacity(mean.nrows());
    Zip::from(mean.column(j))
        .and(variance.column(j))
        .and(target.column(j))
        .for_each(|m, v, y| {
            if *v > 0.0 && v.is_finite() {
                let zi = (y - m).abs() / v.sqrt();
                if zi.is_finite() {
                    z.push(zi);
                }
            }
        });
    z.sort_by_key(|x| OrderedFloat(*x));
    z
}

fn quantile(sorted: &[f32], p: f32) -> f32 {
    let n = sorted.len();
    let ix = ((p * n as f32).ceil() as usize).saturating_sub(1).min(n - 1);
    sorted[ix]
}

/// Per-dimension factors for the predicted standard deviation so that
/// central intervals cover the targets at their nominal rates.
///
/// The factor of dimension `j` averages `quantile_p(|z_j|) / c_p` over
/// [`CONFIDENCE_LEVELS`], where `z_j` are the standardized residuals.
/// Dimensions without positive variance get factor one. Multiply the variance
/// by the square of the factor to calibrate.
pub fn coverage_scale(
    mean: ArrayView2<f32>,
    variance: ArrayView2<f32>,
    target: ArrayView2<f32>,
) -> Array1<f32> {
    Array1::from_shape_fn(mean.ncols(), |j| {
        let z = sorted_z(&mean, &variance, &target, j);
        if z.is_empty() {
            return 1.0;
        }
        let s = CONFIDENCE_LEVELS
            .iter()
            .map(|(p, c)| quantile(&z, *p) / c)
            .sum::<f32>()
            / CONFIDENCE_LEVELS.len() as f32;
        s.max(MIN_SCALE)
    })
}

/// Mean absolute gap between empirical and nominal coverage over
/// [`CONFIDENCE_LEVELS`] and dimensions. Zero for a perfectly calibrated model.
pub fn calibration_score(
    mean: ArrayView2<f32>,
    variance: ArrayView2<f32>,
    target: ArrayView2<f32>,
) -> f32 {
    let mut total = 0.0;
    let mut count = 0;
    for j in 0..mean.ncols() {
        let z = sorted_z(&mean, &variance, &target, j);
        if z.is_empty() {
            continue;
        }
        for (p, c) in CONFIDENCE_LEVELS.iter() {
            let covered = z.iter().filter(|zi| **zi <= *c).count() as f32 / z.len() as f32;
            total += (covered - p).abs();
            count += 1;
        }
    }
    match count {
        0 => 0.0,
        _ => total / count as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::StandardNormal;

    #[test]
    fn test_overconfident_model_is_scaled_up() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 4000;
        let mean = Array2::<f32>::zeros((n, 2));
        // Dimension 0 has twice the predicted spread, dimension 1 is calibrated.
        let target = Array2::from_shape_fn((n, 2), |(_, j)| {
            let z: f32 = rng.sample(StandardNormal);
            if j == 0 {
                2.0 * z
            } else {
                z
            }
        });
        let variance = Array2::<f32>::ones((n, 2));

        let scale = coverage_scale(mean.view(), variance.view(), target.view());
        assert!((scale[0] - 2.0).abs() < 0.2, "{:?}", scale);
        assert!((scale[1] - 1.0).abs() < 0.1, "{:?}", scale);

        let before = calibration_score(mean.view(), variance.view(), target.view());
        let calibrated = &variance * &scale.mapv(|s| s * s);
        let after = calibration_score(mean.view(), calibrated.view(), target.view());
        assert!(after < before);
        assert!(after < 0.05);
    }

    #[test]
    fn test_zero_variance_is_left_alone() {
        let mean = Array2::<f32>::zeros((3, 1));
        let target = Array2::<f32>::ones((3, 1));
        let variance = Array2::<f32>::zeros((3, 1));
        assert_eq!(coverage_scale(mean.view(), variance.view(), target.view())[0], 1.0);
        assert_eq!(calibration_score(mean.view(), variance.view(), target.view()), 0.0);
    }
}
