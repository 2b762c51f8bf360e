//! Learned reward.
use crate::{
    mlp::{Activation, MlpConfig},
    net::Network,
    opt::OptimizerConfig,
    util::tensor_to_array2,
};
use anyhow::Result;
use candle_core::Device;
use foresight_core::{
    model::RunningNormalizer,
    record::{Record, RecordValue},
    RewardModel, TrainableModel, TransitionBatch,
};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of [`NnRewardModel`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NnRewardConfig {
    pub dim_state: usize,
    pub dim_action: usize,
    pub units: Vec<usize>,
    pub activation: Activation,

    #[serde(default)]
    pub opt_config: OptimizerConfig,
}

impl NnRewardConfig {
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

    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }
}

/// Regresses the reward on `[state, action, next_state]` with squared error.
pub struct NnRewardModel {
    net: Network,
    input_normalizer: RunningNormalizer,
    target_normalizer: RunningNormalizer,
}

fn stack(
    state: ArrayView2<f32>,
    action: ArrayView2<f32>,
    next_state: ArrayView2<f32>,
) -> Result<Array2<f32>> {
    Ok(concatenate(Axis(1), &[state.view(), action.view(), next_state.view()])?)
}

impl NnRewardModel {
    pub fn build(config: NnRewardConfig, device: Device) -> Result<Self> {
        let in_dim = 2 * config.dim_state + config.dim_action;
        let mlp_config = MlpConfig::new(in_dim, config.units, 1).activation(config.activation);
        Ok(Self {
            net: Network::build(mlp_config, &config.opt_config, None, &device)?,
            input_normalizer: RunningNormalizer::new(in_dim),
            target_normalizer: RunningNormalizer::new(1),
        })
    }

    fn loss(&self, batch: &TransitionBatch) -> Result<candle_core::Tensor> {
        let x = stack(batch.state.view(), batch.action.view(), batch.next_state.view())?;
        let x = self.input_normalizer.normalize(x.view());
        let y = batch.reward.view().insert_axis(Axis(1));
        let y = self.net.tensor(self.target_normalizer.normalize(y).view())?;
        Ok((self.net.forward(x.view())? - y)?.sqr()?.mean_all()?)
    }

    /// Saves the parameters. Normalization statistics are not included.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.net.save(path)
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.net.load(path)
    }
}

impl RewardModel for NnRewardModel {
    fn reward(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
        next_state: ArrayView2<f32>,
    ) -> Result<Array1<f32>> {
        let x = self
            .input_normalizer
            .normalize(stack(state, action, next_state)?.view());
        let y = tensor_to_array2(&self.net.forward(x.view())?)?;
        Ok(self.target_normalizer.denormalize(y.view()).column(0).to_owned())
    }

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        Some(self)
    }
}

impl TrainableModel for NnRewardModel {
    fn update_statistics(&mut self, batch: &TransitionBatch) -> Result<()> {
        let x = stack(batch.state.view(), batch.action.view(), batch.next_state.view())?;
        self.input_normalizer.update(x.view());
        self.target_normalizer
            .update(batch.reward.view().insert_axis(Axis(1)));
        Ok(())
    }

    fn train_step(&mut self, _head: usize, batch: &TransitionBatch) -> Result<f32> {
        let loss = self.loss(batch)?;
        self.net.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn evaluate(&self, batch: &TransitionBatch) -> Result<Record> {
        let loss = self.loss(batch)?.to_scalar::<f32>()?;
        Ok(Record::from_slice(&[("loss", RecordValue::Scalar(loss))]))
    }
}
