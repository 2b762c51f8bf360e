//! Core data types and model interfaces.
mod env;
mod model;
mod policy;
mod trainable;
mod transition;
pub use env::{Env, Step};
pub use model::{
    check_inputs, BatchedPrediction, DynamicsModel, ModelKind, Prediction, RewardModel,
    TerminalReward, TerminationModel,
};
pub use policy::{BatchPolicy, Policy, RandomPolicy};
pub use trainable::{PosteriorModel, TrainableModel};
pub use transition::{Trajectory, Transition, TransitionBatch};
