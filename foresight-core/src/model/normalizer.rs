use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Running per-column mean and variance, merged batch by batch with the
/// parallel variant of Welford's algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningNormalizer {
    mean: Array1<f32>,
    var: Array1<f32>,
    count: usize,
    epsilon: f32,
}

impl RunningNormalizer {
    /// Identity normalizer for `dim` columns.
    pub fn new(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            var: Array1::ones(dim),
            count: 0,
            epsilon: 1e-6,
        }
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn var(&self) -> &Array1<f32> {
        &self.var
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Standard deviation used for scaling.
    pub fn std(&self) -> Array1<f32> {
        self.var.mapv(|v| (v + self.epsilon).sqrt())
    }

    /// Merges the statistics of `x` (`[n, dim]`).
    pub fn update(&mut self, x: ArrayView2<f32>) {
        let n = x.nrows();
        if n == 0 {
            return;
        }
        let Some(batch_mean) = x.mean_axis(Axis(0)) else {
            return;
        };
        let batch_var = x.var_axis(Axis(0), 0.0);

        if self.count == 0 {
            self.mean = batch_mean;
            self.var = batch_var;
            self.count = n;
            return;
        }

        let (m, k) = (self.count as f32, n as f32);
        let total = m + k;
        let delta = &batch_mean - &self.mean;
        self.mean = (&self.mean * m + &batch_mean * k) / total;
        self.var = (&self.var * m + &batch_var * k) / total
            + delta.mapv(|d| d * d) * (m * k / (total * total));
        self.count += n;
    }

    /// `(x - mean) / std`.
    pub fn normalize(&self, x: ArrayView2<f32>) -> Array2<f32> {
        (&x - &self.mean) / &self.std()
    }

    /// `x * std + mean`.
    pub fn denormalize(&self, x: ArrayView2<f32>) -> Array2<f32> {
        &x * &self.std() + &self.mean
    }

    /// Converts a variance in normalized units back to original units.
    pub fn denormalize_var(&self, var: ArrayView2<f32>) -> Array2<f32> {
        let scale = self.std().mapv(|s| s * s);
        &var * &scale
    }
}
