//! Neural dynamics model.
mod base;
mod config;
pub use base::NnDynamicsModel;
pub use config::NnDynamicsConfig;
