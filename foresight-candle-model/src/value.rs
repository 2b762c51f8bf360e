//! State value used as terminal reward of simulated rollouts.
use crate::{
    mlp::{Activation, Mlp, MlpConfig},
    model::SubModel1,
    net::Network,
    opt::OptimizerConfig,
    util::{array2_to_tensor, tensor_to_array1, track},
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use foresight_core::{
    model::RunningNormalizer,
    record::{Record, RecordValue},
    TerminalReward, TrainableModel, TransitionBatch,
};
use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration of [`NnValueFunction`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct NnValueConfig {
    pub dim_state: usize,
    pub units: Vec<usize>,
    pub activation: Activation,

    #[serde(default)]
    pub opt_config: OptimizerConfig,

    /// Discount factor of the TD target.
    pub gamma: f64,

    /// Soft update coefficient of the target network.
    pub tau: f64,
}

impl NnValueConfig {
    pub fn new(dim_state: usize) -> Self {
        Self {
            dim_state,
            units: vec![64, 64],
            activation: Activation::Relu,
            opt_config: OptimizerConfig::default(),
            gamma: 0.99,
            tau: 0.005,
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

    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }
}

/// State value fitted by TD(0) against a slowly tracking target network.
///
/// The target of a transition is `r + gamma * (1 - done) * V_target(s')`.
pub struct NnValueFunction {
    config: NnValueConfig,
    net: Network,
    target_varmap: VarMap,
    target: Mlp,
    normalizer: RunningNormalizer,
}

impl NnValueFunction {
    pub fn build(config: NnValueConfig, device: Device) -> Result<Self> {
        let mlp_config =
            MlpConfig::new(config.dim_state, config.units.clone(), 1).activation(config.activation);
        let net = Network::build(mlp_config.clone(), &config.opt_config, None, &device)?;
        let target_varmap = VarMap::new();
        let target = {
            let vb = VarBuilder::from_varmap(&target_varmap, DType::F32, &device);
            Mlp::build(vb, mlp_config)?
        };
        track(&target_varmap, net.varmap(), 1.0)?;

        Ok(Self {
            normalizer: RunningNormalizer::new(config.dim_state),
            config,
            net,
            target_varmap,
            target,
        })
    }

    fn td_error(&self, batch: &TransitionBatch) -> Result<Tensor> {
        let s = self.normalizer.normalize(batch.state.view());
        let s1 = self.normalizer.normalize(batch.next_state.view());
        let device = self.net.device();

        let tgt = {
            let v1 = self.target.forward(&array2_to_tensor(s1.view(), device)?)?.detach();
            let r = array2_to_tensor(batch.reward.view().insert_axis(Axis(1)), device)?;
            let not_done = batch.done_f32().mapv(|d| 1.0 - d);
            let not_done = array2_to_tensor(not_done.view().insert_axis(Axis(1)), device)?;
            (r + ((not_done * v1)? * self.config.gamma)?)?
        };
        let v = self.net.forward(s.view())?;
        Ok((v - tgt)?.sqr()?.mean_all()?)
    }
}

impl TerminalReward for NnValueFunction {
    fn value(&self, state: ArrayView2<f32>) -> Result<Array1<f32>> {
        let s = self.normalizer.normalize(state);
        tensor_to_array1(&self.net.forward(s.view())?)
    }

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        Some(self)
    }
}

impl TrainableModel for NnValueFunction {
    fn update_statistics(&mut self, batch: &TransitionBatch) -> Result<()> {
        self.normalizer.update(batch.state.view());
        Ok(())
    }

    fn train_step(&mut self, _head: usize, batch: &TransitionBatch) -> Result<f32> {
        let loss = self.td_error(batch)?;
        self.net.backward_step(&loss)?;
        track(&self.target_varmap, self.net.varmap(), self.config.tau)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn evaluate(&self, batch: &TransitionBatch) -> Result<Record> {
        let loss = self.td_error(batch)?.to_scalar::<f32>()?;
        Ok(Record::from_slice(&[("loss", RecordValue::Scalar(loss))]))
    }
}
