use super::NnDynamicsConfig;
use crate::{
    mlp::MlpConfig,
    net::Network,
    util::{gaussian_nll, param_stats, tensor_to_array2},
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use foresight_core::{
    check_inputs,
    error::ForesightError,
    model::RunningNormalizer,
    record::{Record, RecordValue},
    DynamicsModel, ModelKind, Prediction, TrainableModel, TransitionBatch,
};
use log::info;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Normalization statistics stored next to the parameters.
#[derive(Serialize, Deserialize)]
struct Statistics {
    input: RunningNormalizer,
    target: RunningNormalizer,
    variance_scale: Array1<f32>,
}

/// Output of one head in original units.
struct HeadOutput {
    /// Predicted `next_state - state`.
    delta: Array2<f32>,

    /// Aleatoric variance, `None` for deterministic heads.
    var: Option<Array2<f32>>,
}

/// Ensemble of MLPs predicting the state delta.
///
/// Inputs `[state, action]` and targets `next_state - state` are standardized
/// with running statistics updated by [`TrainableModel::update_statistics`].
/// A probabilistic head outputs the mean and log standard deviation of a
/// diagonal Gaussian. The predicted variance of the ensemble is the mean of the
/// per-head variances plus the variance of the per-head means, multiplied by
/// the calibration scale.
pub struct NnDynamicsModel {
    config: NnDynamicsConfig,
    heads: Vec<Network>,
    input_normalizer: RunningNormalizer,
    target_normalizer: RunningNormalizer,
    variance_scale: Array1<f32>,
}

impl NnDynamicsModel {
    /// Constructs the model with freshly initialized heads.
    pub fn build(config: NnDynamicsConfig, device: Device) -> Result<Self> {
        config.check()?;
        let (ds, da) = (config.dim_state, config.dim_action);
        let out_dim = match config.kind {
            ModelKind::Deterministic => ds,
            ModelKind::Probabilistic => 2 * ds,
        };
        let heads = (0..config.num_heads)
            .map(|_| {
                let mlp_config =
                    MlpConfig::new(ds + da, config.units.clone(), out_dim).activation(config.activation);
                Network::build(mlp_config, &config.opt_config, config.clip_grad_norm, &device)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Build {:?} dynamics model with {} heads",
            config.kind, config.num_heads
        );

        Ok(Self {
            heads,
            input_normalizer: RunningNormalizer::new(ds + da),
            target_normalizer: RunningNormalizer::new(ds),
            variance_scale: Array1::ones(ds),
            config,
        })
    }

    pub fn config(&self) -> &NnDynamicsConfig {
        &self.config
    }

    pub fn variance_scale(&self) -> &Array1<f32> {
        &self.variance_scale
    }

    /// Mean and clamped log standard deviation in normalized units.
    fn forward(&self, head: usize, x: ArrayView2<f32>) -> Result<(Tensor, Option<Tensor>)> {
        let ds = self.config.dim_state;
        let out = self.heads[head].forward(x)?;
        match self.config.kind {
            ModelKind::Deterministic => Ok((out, None)),
            ModelKind::Probabilistic => {
                let mean = out.narrow(1, 0, ds)?;
                let log_std = out
                    .narrow(1, ds, ds)?
                    .clamp(self.config.min_log_std, self.config.max_log_std)?;
                Ok((mean, Some(log_std)))
            }
        }
    }

    fn head_output(&self, head: usize, x: ArrayView2<f32>) -> Result<HeadOutput> {
        let (mean, log_std) = self.forward(head, x)?;
        let delta = self
            .target_normalizer
            .denormalize(tensor_to_array2(&mean)?.view());
        let var = match log_std {
            Some(log_std) => {
                let var = (log_std * 2.0)?.exp()?;
                Some(
                    self.target_normalizer
                        .denormalize_var(tensor_to_array2(&var)?.view()),
                )
            }
            None => None,
        };
        Ok(HeadOutput { delta, var })
    }

    fn loss(&self, head: usize, batch: &TransitionBatch) -> Result<Tensor> {
        let x = self.input_normalizer.normalize(batch.inputs().view());
        let y = self.target_normalizer.normalize(batch.deltas().view());
        let y = self.heads[head].tensor(y.view())?;
        let (mean, log_std) = self.forward(head, x.view())?;
        match log_std {
            Some(log_std) => gaussian_nll(&mean, &log_std, &y),
            None => Ok((mean - y)?.sqr()?.mean_all()?),
        }
    }

    /// Predictions of every head, `(next_state mean, variance)` in original units.
    ///
    /// The variance of deterministic heads is zero.
    pub fn predict_heads(
        &self,
        state: ArrayView2<f32>,
        action: ArrayView2<f32>,
    ) -> Result<Vec<(Array2<f32>, Array2<f32>)>> {
        check_inputs(self, &state, &action)?;
        let x = concatenate(Axis(1), &[state.view(), action.view()])?;
        let x = self.input_normalizer.normalize(x.view());
        (0..self.heads.len())
            .map(|h| {
                let out = self.head_output(h, x.view())?;
                let var = out
                    .var
                    .unwrap_or_else(|| Array2::zeros(out.delta.raw_dim()));
                Ok((&state + &out.delta, var))
            })
            .collect()
    }

    /// Saves the parameters of every head and the normalization statistics in `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        for (i, head) in self.heads.iter().enumerate() {
            head.save(path.join(format!("head{}.safetensors", i)))?;
        }
        let stats = Statistics {
            input: self.input_normalizer.clone(),
            target: self.target_normalizer.clone(),
            variance_scale: self.variance_scale.clone(),
        };
        let mut file = File::create(path.join("statistics.yaml"))?;
        file.write_all(serde_yaml::to_string(&stats)?.as_bytes())?;
        info!("Save dynamics model to {:?}", path);
        Ok(())
    }

    /// Loads what [`NnDynamicsModel::save`] wrote into a model built with the same config.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        for (i, head) in self.heads.iter_mut().enumerate() {
            head.load(path.join(format!("head{}.safetensors", i)))?;
        }
        let rdr = BufReader::new(File::open(path.join("statistics.yaml"))?);
        let stats: Statistics = serde_yaml::from_reader(rdr)?;
        self.input_normalizer = stats.input;
        self.target_normalizer = stats.target;
        self.variance_scale = stats.variance_scale;
        info!("Load dynamics model from {:?}", path);
        Ok(())
    }
}

impl DynamicsModel for NnDynamicsModel {
    fn dim_state(&self) -> usize {
        self.config.dim_state
    }

    fn dim_action(&self) -> usize {
        self.config.dim_action
    }

    fn kind(&self) -> ModelKind {
        self.config.kind
    }

    fn predict(&self, state: ArrayView2<f32>, action: ArrayView2<f32>) -> Result<Prediction> {
        let preds = self.predict_heads(state, action)?;
        let k = preds.len() as f32;
        let (n, ds) = state.dim();

        let mut mean = Array2::<f32>::zeros((n, ds));
        let mut aleatoric = Array2::<f32>::zeros((n, ds));
        for (m, v) in preds.iter() {
            mean += m;
            aleatoric += v;
        }
        mean /= k;
        aleatoric /= k;

        if self.config.kind == ModelKind::Deterministic {
            return Ok(Prediction::deterministic(mean));
        }

        let mut epistemic = Array2::<f32>::zeros((n, ds));
        for (m, _) in preds.iter() {
            let d = m - &mean;
            epistemic += &(&d * &d);
        }
        epistemic /= k;

        let var = (aleatoric + epistemic) * &self.variance_scale;
        Ok(Prediction::from_variance(mean, &var))
    }

    fn as_trainable(&mut self) -> Option<&mut dyn TrainableModel> {
        Some(self)
    }
}

impl TrainableModel for NnDynamicsModel {
    fn num_heads(&self) -> usize {
        self.config.num_heads
    }

    fn update_statistics(&mut self, batch: &TransitionBatch) -> Result<()> {
        self.input_normalizer.update(batch.inputs().view());
        self.target_normalizer.update(batch.deltas().view());
        Ok(())
    }

    fn train_step(&mut self, head: usize, batch: &TransitionBatch) -> Result<f32> {
        if head >= self.heads.len() {
            return Err(ForesightError::config(format!(
                "head {} is out of range, the model has {} heads",
                head,
                self.heads.len()
            )));
        }
        let loss = self.loss(head, batch)?;
        self.heads[head].backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    /// Mean loss over the heads, plus mean and standard deviation of the
    /// parameters of each head under `head{i}/`.
    fn evaluate(&self, batch: &TransitionBatch) -> Result<Record> {
        let mut total = 0f32;
        let mut record = Record::empty();
        for (h, head) in self.heads.iter().enumerate() {
            total += self.loss(h, batch)?.to_scalar::<f32>()?;
            record.merge_with_prefix(&format!("head{}", h), param_stats(head.varmap())?);
        }
        let loss = total / self.heads.len() as f32;
        record.insert("loss", RecordValue::Scalar(loss));
        Ok(record)
    }

    fn set_variance_scale(&mut self, scale: Array1<f32>) -> Result<()> {
        if scale.len() != self.config.dim_state {
            return Err(ForesightError::dimension(format!(
                "variance scale has {} elements, state has {}",
                scale.len(),
                self.config.dim_state
            )));
        }
        self.variance_scale = scale;
        Ok(())
    }
}
