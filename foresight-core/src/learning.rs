//! Incremental model learning from collected trajectories.
//!
//! [`ModelLearning`] owns a train and a validation [`BootstrapReplayBuffer`]
//! and, for every new trajectory, fits the models it is given, calibrates the
//! uncertainty of probabilistic dynamics and reports validation metrics.
//!
//! [`BootstrapReplayBuffer`]: crate::replay_buffer::BootstrapReplayBuffer
mod base;
mod config;
mod metrics;
pub use base::{ModelLearning, ModelSet};
pub use config::ModelLearningConfig;
pub use metrics::{evaluate_dynamics, evaluate_reward};
