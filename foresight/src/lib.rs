//! Model-based reinforcement learning in Rust.
//!
//! Foresight consists of the following crates:
//!
//! * [foresight-core](foresight_core) provides the model interfaces, the
//!   [`Simulator`](foresight_core::simulator::Simulator) rolling out learned
//!   models, the [`ShootingPlanner`](foresight_core::shooting::ShootingPlanner)
//!   (random shooting, CEM and MPPI), the bootstrapped replay buffer, the
//!   model-learning loop, an exact Gaussian process model and the
//!   [`MpcAgent`](foresight_core::agent::MpcAgent) tying everything together.
//! * [foresight-candle-model](https://crates.io/crates/foresight-candle-model)
//!   provides neural dynamics, reward, termination and value models based on
//!   [candle](https://crates.io/crates/candle-core). Enabled by the `candle`
//!   feature.
//!
//! This crate re-exports both.
//!
//! ```rust
//! use foresight::{
//!     model::{FnDynamicsModel, FnRewardModel},
//!     shooting::{ShootingConfig, ShootingPlanner, SolverKind},
//!     simulator::Simulator,
//! };
//! use ndarray::array;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let dynamics = FnDynamicsModel::new(1, 1, |s, a| &s + &a);
//! let reward = FnRewardModel::new(|_s, _a, s1| s1.column(0).mapv(|x| -x.abs()));
//! let config = ShootingConfig::default()
//!     .solver(SolverKind::Cem)
//!     .horizon(5)
//!     .action_scale(1.0);
//! let mut planner = ShootingPlanner::build(config).unwrap();
//! let sim = Simulator::new(&dynamics, &reward);
//! let mut rng = StdRng::seed_from_u64(42);
//! let action = planner.plan(&sim, array![3.0f32].view(), &mut rng).unwrap();
//! assert!(action[0] < 0.0);
//! ```
pub use foresight_core::*;

#[cfg(feature = "candle")]
pub use foresight_candle_model as candle;
