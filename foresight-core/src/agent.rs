//! Model-predictive control agent.
mod base;
mod config;
pub use base::MpcAgent;
pub use config::{Exploration, MpcAgentConfig};
