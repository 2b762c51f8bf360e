//! Bootstrapped replay buffer.
//!
//! A fixed-capacity ring of transitions. Each stored transition carries a
//! bootstrap mask with one bit per ensemble head, drawn once at insertion, so
//! that every head of an ensemble model is trained on its own resample of the
//! data.
mod base;
mod config;
pub use base::BootstrapReplayBuffer;
pub use config::{BootstrapReplayBufferConfig, DEFAULT_BOOTSTRAP_PROB};
