use crate::base::{check_inputs, DynamicsModel, ModelKind, Prediction};
use anyhow::Result;
use ndarray::{s, ArrayView2};

/// Hallucinated-control view of a probabilistic model.
///
/// The action is extended with `dim_state` extra inputs `eta`, clipped to
/// `[-1, 1]`, that select a next state inside the model's confidence region:
/// `next = mean + beta * std * eta`. Planning over the extended action
/// optimizes optimistically over the plausible dynamics. The resulting model is
/// deterministic.
pub struct OptimisticModel<'a, M: DynamicsModel + ?Sized> {
    base: &'a M,
    beta: f32,
}

impl<'a, M: DynamicsModel + ?Sized> OptimisticModel<'a, M> {
    pub fn new(base: &'a M, beta: f32) -> Self {
        Self { base, beta }
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }
}

impl<'a, M: DynamicsModel + ?Sized> DynamicsModel for OptimisticModel<'a, M> {
    fn dim_state(&self) -> usize {
        self.base.dim_state()
    }

    fn dim_action(&self) -> usize {
        self.base.dim_action() + self.base.dim_state()
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Deterministic
    }

    fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction> {
        check_inputs(self, &state, &action)?;
        let da = self.base.dim_action();
        let real = action.slice(s![.., ..da]);
        let eta = action.slice(s![.., da..]).mapv(|e| e.clamp(-1.0, 1.0));

        let pred = self.base.predict(state, real)?;
        let std = pred.variance().mapv(|v| v.max(0.0).sqrt());
        let next = &pred.mean + &(std * eta * self.beta);
        Ok(Prediction::deterministic(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    struct Noisy;

    impl DynamicsModel for Noisy {
        fn dim_state(&self) -> usize {
            2
        }

        fn dim_action(&self) -> usize {
            1
        }

        fn kind(&self) -> ModelKind {
            ModelKind::Probabilistic
        }

        fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction> {
            let mean = &state + &action;
            let var = Array2::from_elem(mean.dim(), 4.0);
            Ok(Prediction::from_variance(mean, &var))
        }
    }

    #[test]
    fn test_hallucinated_inputs_shift_the_mean() -> Result<()> {
        let model = OptimisticModel::new(&Noisy, 0.5);
        assert_eq!(model.dim_action(), 3);
        assert_eq!(model.kind(), ModelKind::Deterministic);

        let state = array![[0.0f32, 1.0]];
        let action = array![[1.0f32, 1.0, -3.0]];
        let pred = model.predict(state.view(), action.view())?;
        // mean [1, 2], std 2, eta [1, -1] after clipping.
        assert_eq!(pred.mean, array![[2.0, 1.0]]);
        assert!(pred.covariance.iter().all(|c| *c == 0.0));
        Ok(())
    }
}
