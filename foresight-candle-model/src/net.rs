//! An MLP bundled with its parameters and optimizer.
use crate::{
    mlp::{Mlp, MlpConfig},
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::array2_to_tensor,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use ndarray::ArrayView2;
use std::path::Path;

pub(crate) struct Network {
    device: Device,
    varmap: VarMap,
    mlp: Mlp,
    opt: Optimizer,
    clip_grad_norm: Option<f64>,
}

impl Network {
    pub fn build(
        mlp_config: MlpConfig,
        opt_config: &OptimizerConfig,
        clip_grad_norm: Option<f64>,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let mlp = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Mlp::build(vb, mlp_config)?
        };
        let opt = opt_config.build(varmap.all_vars())?;
        Ok(Self {
            device: device.clone(),
            varmap,
            mlp,
            opt,
            clip_grad_norm,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Converts an array to a tensor on the device of the network.
    pub fn tensor(&self, x: ArrayView2<f32>) -> Result<Tensor> {
        array2_to_tensor(x, &self.device)
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Tensor> {
        self.mlp.forward(&self.tensor(x)?)
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self.clip_grad_norm {
            Some(max_norm) => {
                self.opt
                    .backward_step_clipped(loss, &self.varmap.all_vars(), max_norm)
            }
            None => self.opt.backward_step(loss),
        }
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save network to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load network from {:?}", path.as_ref());
        Ok(())
    }
}
