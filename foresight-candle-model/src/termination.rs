//! Learned termination.
use crate::{
    mlp::{Activation, MlpConfig},
    net::Network,
    opt::OptimizerConfig,
    util::{binary_cross_entropy_with_logits, tensor_to_array2},
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use foresight_core::{
    model::RunningNormalizer,
    record::{Record, RecordValue},
    TerminationModel, TrainableModel, TransitionBatch,
};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration of [`NnTerminationModel`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NnTerminationConfig {
    pub dim_state: usize,
    pub dim_action: usize,
    pub units: Vec<usize>,
    pub activation: Activation,

    #[serde(default)]
    pub opt_config: OptimizerConfig,
}

impl NnTerminationConfig {
    pub fn new(dim_state: usize, dim_action: usize) -> Self {
        Self {
            dim_state,
            dim_action,
            units: vec![64, 64],
            activation: Activation::Relu,
            opt_config: OptimizerConfig::default(),
        }
    }

    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }
}

/// Binary classifier of terminating transitions.
///
/// A transition is terminal when the predicted logit is positive.
pub struct NnTerminationModel {
    net: Network,
    input_normalizer: RunningNormalizer,
}

impl NnTerminationModel {
    pub fn build(config: NnTerminationConfig, device: Device) -> Result<Self> {
        let in_dim = 2 * config.dim_state + config.dim_action;
        let mlp_config = MlpConfig::new(in_dim, config.units, 1).activation(config.activation);
        Ok(Self {
            net: Network::build(mlp_config, &config.opt_config, None, &device)?,
            input_normalizer: RunningNormalizer::new(in_dim),
        })
    }

    fn inputs(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let x = concatenate(Axis(1), &[state.view(), action.view(), next_state.view()])?;
        Ok(self.input_normalizer.normalize(x.view()))
    }

    fn logits(&self, batch: &TransitionBatch) -> Result<Tensor> {
        let x = self.inputs(batch.state.view(), batch.action.view(), batch.next_state.view())?;
        self.net.forward(x.view())
    }

    fn target(&self, batch: &TransitionBatch) -> Result<Tensor> {
        self.net.tensor(batch.done_f32().view().insert_axis(Axis(1)))
    }
}

impl TerminationModel for NnTerminationModel {
    fn is_terminal(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<bool>> {
        let x = self.inputs(state, action, next_state)?;
        let logits = tensor_to_array2(&self.net.forward(x.view())?)?;
        Ok(logits.column(0).mapv(|l| l > 0.0))
    }

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        Some(self)
    }
}

impl TrainableModel for NnTerminationModel {
    fn update_statistics(&mut self, batch: &TransitionBatch) -> Result<()> {
        let x = concatenate(
            Axis(1),
            &[batch.state.view(), batch.action.view(), batch.next_state.view()],
        )?;
        self.input_normalizer.update(x.view());
        Ok(())
    }

    fn train_step(&mut self, _head: usize, batch: &TransitionBatch) -> Result<f32> {
        let loss = binary_cross_entropy_with_logits(&self.logits(batch)?, &self.target(batch)?)?;
        self.net.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn evaluate(&self, batch: &TransitionBatch) -> Result<Record> {
        let logits = self.logits(batch)?;
        let loss = binary_cross_entropy_with_logits(&logits, &self.target(batch)?)?
            .to_scalar::<f32>()?;
        let predicted = tensor_to_array2(&logits)?.column(0).mapv(|l| l > 0.0);
        let correct = predicted
            .iter()
            .zip(batch.done.iter())
            .filter(|(p, d)| p == d)
            .count();
        let accuracy = correct as f32 / batch.len() as f32;
        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("accuracy", RecordValue::Scalar(accuracy)),
        ]))
    }
}
