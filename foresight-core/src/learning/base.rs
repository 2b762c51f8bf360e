use super::{evaluate_dynamics, evaluate_reward, ModelLearningConfig};
use crate::{
    base::{
        DynamicsModel, ModelKind, RewardModel, TerminalReward, TerminationModel, Trajectory,
        TrainableModel, TransitionBatch,
    },
    error::ForesightError,
    model::coverage_scale,
    record::{Record, RecordValue},
    replay_buffer::{BootstrapReplayBuffer, BootstrapReplayBufferConfig},
};
use anyhow::Result;
use log::{debug, info, warn};
use ndarray::Array1;
use rand::{Rng, RngCore};

/// Models updated by [`ModelLearning::learn`].
///
/// Reward, termination and terminal reward models are fitted only if they
/// expose trainable parameters.
pub struct ModelSet<'a> {
    pub dynamics: &'a mut dyn DynamicsModel,
    pub reward: &'a mut dyn RewardModel,
    pub termination: Option<&'a mut dyn TerminationModel>,
    pub terminal_reward: Option<&'a mut dyn TerminalReward>,
}

impl<'a> ModelSet<'a> {
    pub fn new(dynamics: &'a mut dyn DynamicsModel, reward: &'a mut dyn RewardModel) -> Self {
        Self {
            dynamics,
            reward,
            termination: None,
            terminal_reward: None,
        }
    }

    pub fn termination(mut self, v: &'a mut dyn TerminationModel) -> Self {
        self.termination = Some(v);
        self
    }

    pub fn terminal_reward(mut self, v: &'a mut dyn TerminalReward) -> Self {
        self.terminal_reward = Some(v);
        self
    }
}

/// Fits models to collected experience.
///
/// Each call of [`ModelLearning::learn`] runs
///
/// 1. Split: every transition goes to the validation buffer with probability
///    `validation_ratio`, otherwise to the train buffer.
/// 2. Fit: trainable models update their normalization statistics with the new
///    trajectory and are trained for `num_epochs` epochs of
///    `ceil(len(train) / batch_size)` steps. An ensemble takes one step per
///    head, each on a sample of its bootstrap partition. Dynamics come first,
///    followed by reward, termination and terminal value.
/// 3. Calibrate: the variance of probabilistic dynamics is rescaled per
///    dimension to match the empirical coverage on the validation buffer.
/// 4. Evaluate: validation metrics of every fitted model.
/// 5. Posterior update: models conditioned on raw data (Gaussian processes)
///    receive the whole trajectory and are summarized above their capacity.
pub struct ModelLearning {
    config: ModelLearningConfig,
    train: BootstrapReplayBuffer,
    validation: BootstrapReplayBuffer,
}

impl ModelLearning {
    /// Constructs the loop with buffers holding `num_heads` bootstrap masks.
    pub fn build(config: ModelLearningConfig, num_heads: usize) -> Result<Self> {
        config.check()?;
        let buffer_config = BootstrapReplayBufferConfig::default()
            .capacity(config.max_memory)
            .num_heads(num_heads)
            .bootstrap(config.bootstrap)
            .bootstrap_prob(config.bootstrap_prob);
        Ok(Self {
            train: BootstrapReplayBuffer::build(&buffer_config)?,
            validation: BootstrapReplayBuffer::build(&buffer_config)?,
            config,
        })
    }

    pub fn config(&self) -> &ModelLearningConfig {
        &self.config
    }

    pub fn train_buffer(&self) -> &BootstrapReplayBuffer {
        &self.train
    }

    pub fn validation_buffer(&self) -> &BootstrapReplayBuffer {
        &self.validation
    }

    /// Learns from a newly collected trajectory and returns validation metrics.
    ///
    /// Keys are prefixed by the model, e.g., `dynamics/mse`, `reward/train_loss`
    /// or `dynamics/gp_num_inputs`.
    pub fn learn(
        &mut self,
        trajectory: &Trajectory,
        models: ModelSet<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Record> {
        let mut record = Record::empty();
        if trajectory.is_empty() {
            debug!("Skip learning from an empty trajectory");
            return Ok(record);
        }
        let ModelSet {
            dynamics,
            reward,
            mut termination,
            mut terminal_reward,
        } = models;

        // Split
        for t in trajectory.iter() {
            if rng.gen::<f64>() < self.config.validation_ratio {
                self.validation.append(t.clone(), rng);
            } else {
                self.train.append(t.clone(), rng);
            }
        }
        let new_data = trajectory.to_batch()?;

        // Fit dynamics and calibrate
        if let Some(model) = dynamics.as_trainable() {
            model.update_statistics(&new_data)?;
            if let Some(loss) = self.fit("dynamics", model, rng)? {
                record.insert("dynamics/train_loss", RecordValue::Scalar(loss));
            }
        }
        if self.config.calibrate && dynamics.kind() == ModelKind::Probabilistic {
            if let Some(scale) = self.calibrate(dynamics)? {
                record.insert("dynamics/variance_scale", RecordValue::Array1(scale.to_vec()));
            }
        }

        // Fit the other models
        let mut reward_trained = false;
        if let Some(model) = reward.as_trainable() {
            model.update_statistics(&new_data)?;
            if let Some(loss) = self.fit("reward", model, rng)? {
                record.insert("reward/train_loss", RecordValue::Scalar(loss));
            }
            reward_trained = true;
        }
        if let Some(model) = termination.as_mut().and_then(|m| m.as_trainable()) {
            model.update_statistics(&new_data)?;
            if let Some(loss) = self.fit("termination", model, rng)? {
                record.insert("termination/train_loss", RecordValue::Scalar(loss));
            }
        }
        if let Some(model) = terminal_reward.as_mut().and_then(|m| m.as_trainable()) {
            model.update_statistics(&new_data)?;
            if let Some(loss) = self.fit("value", model, rng)? {
                record.insert("value/train_loss", RecordValue::Scalar(loss));
            }
        }

        // Evaluate
        if !self.validation.is_empty() {
            let valid = self.validation.all()?;
            let mut r = evaluate_dynamics(&*dynamics, &valid)?;
            if let Some(model) = dynamics.as_trainable() {
                r.merge_inplace(model.evaluate(&valid)?);
            }
            record.merge_with_prefix("dynamics", r);

            if reward_trained {
                let mut r = evaluate_reward(&*reward, &valid)?;
                if let Some(model) = reward.as_trainable() {
                    r.merge_inplace(model.evaluate(&valid)?);
                }
                record.merge_with_prefix("reward", r);
            }
            if let Some(model) = termination.as_mut().and_then(|m| m.as_trainable()) {
                record.merge_with_prefix("termination", model.evaluate(&valid)?);
            }
            if let Some(model) = terminal_reward.as_mut().and_then(|m| m.as_trainable()) {
                record.merge_with_prefix("value", model.evaluate(&valid)?);
            }
        }

        // Posterior update
        if let Some(gp) = dynamics.as_posterior() {
            info!("Add {} transitions to the GP posterior", new_data.len());
            gp.add_data(&new_data)?;
            if gp.num_points() > gp.max_num_points() {
                gp.summarize()?;
            }
            record.insert(
                "dynamics/gp_num_inputs",
                RecordValue::Scalar(gp.num_points() as f32),
            );
        }

        record.insert("train_size", RecordValue::Scalar(self.train.len() as f32));
        record.insert(
            "validation_size",
            RecordValue::Scalar(self.validation.len() as f32),
        );
        for (k, v) in record.iter() {
            if let RecordValue::Scalar(v) = v {
                info!("{}: {:.5}", k, v);
            }
        }
        Ok(record)
    }

    /// Fits `model` on the train buffer and returns the mean loss of the last
    /// epoch, or `None` if nothing was fitted.
    fn fit(
        &self,
        name: &str,
        model: &mut dyn TrainableModel,
        rng: &mut dyn RngCore,
    ) -> Result<Option<f32>> {
        let num_epochs = self.config.num_epochs;
        if num_epochs == 0 {
            return Ok(None);
        }
        if self.train.is_empty() {
            warn!("Train buffer is empty, skip fitting the {} model", name);
            return Ok(None);
        }
        let num_heads = model.num_heads();
        if num_heads > 1 && num_heads != self.train.num_heads() {
            return Err(ForesightError::config(format!(
                "{} model has {} heads but the buffers hold {} bootstrap masks",
                name,
                num_heads,
                self.train.num_heads()
            )));
        }
        let batch_size = self.config.batch_size;
        let num_steps = (self.train.len() + batch_size - 1) / batch_size;
        info!("Train {} model for {} epochs", name, num_epochs);

        let mut last = 0.0;
        for epoch in 0..num_epochs {
            let mut total = 0.0;
            for _ in 0..num_steps {
                for head in 0..num_heads {
                    let batch = match num_heads {
                        1 => self.train.sample_uniform(batch_size, rng)?,
                        _ => self.train.sample(batch_size, head, rng)?,
                    };
                    total += model.train_step(head, &batch)?;
                }
            }
            last = total / (num_steps * num_heads) as f32;
            debug!("{} model, epoch {}: loss {:.5}", name, epoch, last);
        }
        Ok(Some(last))
    }

    /// Fits per-dimension variance multipliers on the validation buffer.
    fn calibrate(&self, dynamics: &mut dyn DynamicsModel) -> Result<Option<Array1<f32>>> {
        if self.validation.is_empty() {
            return Ok(None);
        }
        let ds = dynamics.dim_state();
        match dynamics.as_trainable() {
            Some(model) => model.set_variance_scale(Array1::ones(ds))?,
            None => return Ok(None),
        }
        let valid: TransitionBatch = self.validation.all()?;
        let pred = dynamics.predict(valid.state.view(), valid.action.view())?;
        let var = pred.variance();
        let scale = coverage_scale(pred.mean.view(), var.view(), valid.next_state.view())
            .mapv(|s| s * s);
        if let Some(model) = dynamics.as_trainable() {
            model.set_variance_scale(scale.clone())?;
        }
        debug!("Calibrated variance scale: {:?}", scale);
        Ok(Some(scale))
    }
}
