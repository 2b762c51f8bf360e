//! Shooting methods for model-predictive control.
//!
//! [`ShootingPlanner`] searches for an action sequence maximizing the
//! discounted return of rollouts simulated with a learned model, then returns
//! the first action of the sequence.
//!
//! The three solvers differ in the update step:
//!
//! * [`SolverKind::Random`] runs a single iteration and keeps the best candidate.
//! * [`SolverKind::Cem`] refits the sampling distribution to the elites.
//! * [`SolverKind::Mppi`] moves the mean to the return-weighted average of the
//!   candidates, with noise smoothed over time by an FIR filter.
mod base;
mod config;
mod sampling;
mod update;
pub use base::ShootingPlanner;
pub use config::{DefaultAction, ShootingConfig, SolverKind};
pub use sampling::{filter_noise, shift_sequence};
pub use update::{elite_indices, importance_weights};
