//! Key-value records of metrics.
//!
//! A [`Record`] is returned by [`ModelLearning::learn`](crate::learning::ModelLearning::learn)
//! and [`ShootingPlanner::plan_with_record`](crate::shooting::ShootingPlanner::plan_with_record),
//! and can be passed to any [`Recorder`].
//!
//! ```rust
//! use foresight_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("dynamics/mse", 0.25);
//! record.insert("planner/elite_mean_return", RecordValue::Array1(vec![-3.0, -2.5]));
//! assert_eq!(record.get_scalar("dynamics/mse").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
