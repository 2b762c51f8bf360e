//! Backend-agnostic model implementations.
//!
//! * [`FnDynamicsModel`], [`FnRewardModel`], [`FnTerminationModel`] wrap known
//!   closed-form functions.
//! * [`OptimisticModel`] turns a probabilistic model into a deterministic one
//!   with hallucinated control inputs.
//! * [`ExactGpModel`] is an exact Gaussian process on state deltas with a
//!   bounded set of training points.
mod calibration;
mod fn_model;
mod gp;
mod normalizer;
mod optimistic;
pub use calibration::{calibration_score, coverage_scale, CONFIDENCE_LEVELS};
pub use fn_model::{FnDynamicsModel, FnRewardModel, FnTerminalReward, FnTerminationModel};
pub use gp::{ExactGpModel, GpConfig};
pub use normalizer::RunningNormalizer;
pub use optimistic::OptimisticModel;
