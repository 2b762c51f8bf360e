use crate::base::{
    check_inputs, DynamicsModel, ModelKind, Prediction, RewardModel, TerminalReward,
    TerminationModel,
};
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView2};

type DynamicsFn = dyn Fn(ArrayView2<f32>, ArrayView2<f32>) -> Array2<f32> + Send + Sync;
type TransitionFn<T> =
    dyn Fn(ArrayView2<f32>, ArrayView2<f32>, ArrayView2<f32>) -> Array1<T> + Send + Sync;

/// Deterministic dynamics given by a closure `(state, action) -> next_state`.
pub struct FnDynamicsModel {
    dim_state: usize,
    dim_action: usize,
    f: Box<DynamicsFn>,
}

impl FnDynamicsModel {
    pub fn new<F>(dim_state: usize, dim_action: usize, f: F) -> Self
    where
        F: Fn(ArrayView2<f32>, ArrayView2<f32>) -> Array2<f32> + Send + Sync + 'static,
    {
        Self {
            dim_state,
            dim_action,
            f: Box::new(f),
        }
    }
}

impl DynamicsModel for FnDynamicsModel {
    fn dim_state(&self) -> usize {
        self.dim_state
    }

    fn dim_action(&self) -> usize {
        self.dim_action
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Deterministic
    }

    fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction> {
        check_inputs(self, &state, &action)?;
        Ok(Prediction::deterministic((self.f)(state, action)))
    }
}

/// Reward given by a closure `(state, action, next_state) -> reward`.
pub struct FnRewardModel(Box<TransitionFn<f32>>);

impl FnRewardModel {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ArrayView2<f32>, ArrayView2<f32>, ArrayView2<f32>) -> Array1<f32>
            + Send
            + Sync
            + 'static,
    {
        Self(Box::new(f))
    }
}

impl RewardModel for FnRewardModel {
    fn reward(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<f32>> {
        Ok((self.0)(state, action, next_state))
    }
}

/// Termination given by a closure `(state, action, next_state) -> done`.
pub struct FnTerminationModel(Box<TransitionFn<bool>>);

impl FnTerminationModel {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ArrayView2<f32>, ArrayView2<f32>, ArrayView2<f32>) -> Array1<bool>
            + Send
            + Sync
            + 'static,
    {
        Self(Box::new(f))
    }
}

impl TerminationModel for FnTerminationModel {
    fn is_terminal(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<bool>> {
        Ok((self.0)(state, action, next_state))
    }
}

/// Terminal value given by a closure `state -> value`.
pub struct FnTerminalReward(Box<dyn Fn(ArrayView2<f32>) -> Array1<f32> + Send + Sync>);

impl FnTerminalReward {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ArrayView2<f32>) -> Array1<f32> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }
}

impl TerminalReward for FnTerminalReward {
    fn value(&self, state: ArrayView2<f32>) -> Result<Array1<f32>> {
        Ok((self.0)(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForesightError;
    use ndarray::{Array, Array2, Array3};

    #[test]
    fn test_predict_shapes() -> Result<()> {
        let model = FnDynamicsModel::new(3, 2, |s, a| {
            let mut next = s.to_owned();
            next.column_mut(0).scaled_add(1.0, &a.column(0));
            next
        });
        let pred = model.predict(Array2::zeros((7, 3)).view(), Array2::ones((7, 2)).view())?;
        assert_eq!(pred.mean.dim(), (7, 3));
        assert_eq!(pred.covariance.dim(), (7, 3, 3));
        assert!(pred.covariance.iter().all(|c| *c == 0.0));

        let s = Array3::<f32>::zeros((4, 5, 3)).into_dyn();
        let a = Array3::<f32>::ones((4, 5, 2)).into_dyn();
        let pred = model.predict_batched(s.view(), a.view())?;
        assert_eq!(pred.mean.shape(), &[4, 5, 3]);
        assert_eq!(pred.covariance.shape(), &[4, 5, 3, 3]);
        assert!(pred.mean.iter().step_by(3).all(|x| *x == 1.0));
        Ok(())
    }

    #[test]
    fn test_mismatched_dims() {
        let model = FnDynamicsModel::new(3, 2, |s, _a| s.to_owned());
        let e = model
            .predict(Array2::zeros((7, 4)).view(), Array2::zeros((7, 2)).view())
            .unwrap_err();
        assert!(matches!(
            e.downcast_ref::<ForesightError>(),
            Some(ForesightError::Dimension(_))
        ));
        assert!(model
            .predict(Array2::zeros((7, 3)).view(), Array2::zeros((6, 2)).view())
            .is_err());

        let s = Array::<f32, _>::zeros((4, 5, 3)).into_dyn();
        let a = Array::<f32, _>::zeros((5, 4, 2)).into_dyn();
        assert!(model.predict_batched(s.view(), a.view()).is_err());
    }
}
