//! Neural models for foresight implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`dynamics::NnDynamicsModel`]: ensemble of MLPs predicting normalized
//!   state deltas, deterministic or Gaussian.
//! * [`reward::NnRewardModel`] and [`termination::NnTerminationModel`]:
//!   learned reward and termination.
//! * [`value::NnValueFunction`]: state value with a target snapshot, used as
//!   terminal reward of the planner.
pub mod dynamics;
pub mod mlp;
pub mod model;
mod net;
pub mod opt;
pub mod reward;
pub mod termination;
pub mod util;
pub mod value;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() -> anyhow::Result<()> {
        let device: candle_core::Device = Device::Cpu.try_into()?;
        assert!(device.is_cpu());
        Ok(())
    }
}
