//! Model-based planning and model learning.
//!
//! The crate is organized around a learned [`DynamicsModel`]:
//!
//! * [`simulator`] rolls out action sequences on the model,
//! * [`shooting`] optimizes action sequences by random shooting, CEM or MPPI,
//! * [`replay_buffer`] stores experience with bootstrap masks for ensembles,
//! * [`learning`] fits the models to collected trajectories,
//! * [`agent`] and [`trainer`] tie planning and learning to an [`Env`].
//!
//! All randomness comes from an explicit `&mut dyn RngCore` argument, so a
//! seeded generator makes every run reproducible.
pub mod agent;
pub mod error;
pub mod learning;
pub mod model;
pub mod record;
pub mod replay_buffer;
pub mod shooting;
pub mod simulator;
pub mod trainer;

mod base;
pub use base::{
    check_inputs, BatchPolicy, BatchedPrediction, DynamicsModel, Env, ModelKind,
    PosteriorModel, Prediction, RandomPolicy, RewardModel, Policy, Step, TerminalReward,
    TerminationModel, TrainableModel, Trajectory, Transition, TransitionBatch,
};
