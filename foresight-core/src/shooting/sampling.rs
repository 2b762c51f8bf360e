//! Candidate generation.
use super::DefaultAction;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

/// Independent Gaussian over action sequences, `[horizon, da]`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ActionDistribution {
    pub mean: Array2<f32>,
    pub std: Array2<f32>,
}

impl ActionDistribution {
    pub fn new(mean: Array2<f32>, std: f32) -> Self {
        let std = Array2::from_elem(mean.dim(), std);
        Self { mean, std }
    }

    /// Zero-mean noise `[n, horizon, da]` with the distribution's scale.
    pub fn sample_noise(&self, n: usize, rng: &mut dyn RngCore) -> Array3<f32> {
        let (h, da) = self.mean.dim();
        Array3::from_shape_fn((n, h, da), |(_, t, j)| {
            let z: f32 = rng.sample(StandardNormal);
            z * self.std[[t, j]]
        })
    }

    /// `mean + noise`, clipped to `[-action_scale, action_scale]`.
    pub fn candidates(&self, noise: &Array3<f32>, action_scale: f32) -> Array3<f32> {
        let mut c = noise + &self.mean;
        c.mapv_inplace(|a| a.clamp(-action_scale, action_scale));
        c
    }
}

/// Shifts an action sequence one step forward, filling the last step
/// according to `default_action`.
///
/// ```rust
/// use foresight_core::shooting::{shift_sequence, DefaultAction};
/// use ndarray::array;
///
/// let seq = array![[1.0f32], [2.0], [3.0]];
/// assert_eq!(shift_sequence(seq.view(), DefaultAction::Zero), array![[2.0], [3.0], [0.0]]);
/// assert_eq!(shift_sequence(seq.view(), DefaultAction::Constant), array![[2.0], [3.0], [3.0]]);
/// assert_eq!(shift_sequence(seq.view(), DefaultAction::Mean), array![[2.0], [3.0], [2.5]]);
/// ```
pub fn shift_sequence(seq: ArrayView2<f32>, default_action: DefaultAction) -> Array2<f32> {
    let (h, da) = seq.dim();
    let mut out = Array2::zeros((h, da));
    if h == 0 {
        return out;
    }
    out.slice_mut(s![..h - 1, ..]).assign(&seq.slice(s![1.., ..]));
    let last: Array1<f32> = match default_action {
        DefaultAction::Zero => Array1::zeros(da),
        DefaultAction::Constant => seq.row(h - 1).to_owned(),
        DefaultAction::Mean => seq
            .slice(s![1.., ..])
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(da)),
    };
    out.row_mut(h - 1).assign(&last);
    out
}

/// Smooths noise over time with a causal FIR filter.
///
/// `out[t] = sum_j b_j noise[t - j] / sum_j b_j` over `j <= min(t, len(b) - 1)`,
/// so `b_0` weights the current step. Filtering reads the raw noise only.
pub fn filter_noise(noise: ArrayView3<f32>, coefficients: &[f32]) -> Array3<f32> {
    let (_, h, _) = noise.dim();
    let mut out = Array3::zeros(noise.raw_dim());
    for t in 0..h {
        let taps = coefficients.len().min(t + 1);
        let norm: f32 = coefficients[..taps].iter().sum();
        let mut acc = out.slice_mut(s![.., t, ..]);
        for (j, b) in coefficients[..taps].iter().enumerate() {
            acc.scaled_add(*b / norm, &noise.slice(s![.., t - j, ..]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn test_shift_zero_pads() {
        let seq = array![[1.0f32, -1.0], [2.0, -2.0], [3.0, -3.0]];
        let shifted = shift_sequence(seq.view(), DefaultAction::Zero);
        assert_eq!(shifted, array![[2.0, -2.0], [3.0, -3.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_shift_single_step() {
        let seq = array![[4.0f32]];
        assert_eq!(shift_sequence(seq.view(), DefaultAction::Mean), array![[0.0]]);
        assert_eq!(shift_sequence(seq.view(), DefaultAction::Constant), array![[4.0]]);
    }

    #[test]
    fn test_filter_noise() {
        let noise = Array::from_shape_vec((1, 3, 1), vec![1.0f32, 2.0, 4.0]).unwrap();
        let out = filter_noise(noise.view(), &[0.2, 0.8]);
        // t = 0 uses b_0 only; later steps mix the current and previous noise.
        let expected = [1.0f32, 0.2 * 2.0 + 0.8 * 1.0, 0.2 * 4.0 + 0.8 * 2.0];
        for (o, e) in out.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-6);
        }
        // The input is not modified and a single coefficient is the identity.
        assert_eq!(filter_noise(noise.view(), &[0.5]), noise);
    }
}
