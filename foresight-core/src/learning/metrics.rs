//! Validation metrics of learned models.
use crate::{
    base::{DynamicsModel, ModelKind, RewardModel, TransitionBatch},
    model::calibration_score,
    record::{Record, RecordValue::Scalar},
};
use anyhow::Result;
use ndarray::{Array2, Axis, Zip};
use std::f32::consts::PI;

const MIN_VARIANCE: f32 = 1e-6;

/// Prediction metrics of a dynamics model on `batch`.
///
/// Keys: `mse`, and for probabilistic models `nll` (per dimension), `sharpness`
/// (mean predicted variance) and `calibration_score`.
pub fn evaluate_dynamics(model: &dyn DynamicsModel, batch: &TransitionBatch) -> Result<Record> {
    let pred = model.predict(batch.state.view(), batch.action.view())?;
    let err = &pred.mean - &batch.next_state;
    let mut record = Record::from_scalar("mse", mse(&err));

    if model.kind() == ModelKind::Probabilistic {
        let var = pred.variance();
        let mut nll = 0.0;
        Zip::from(&err).and(&var).for_each(|e, v| {
            let v = v.max(MIN_VARIANCE);
            nll += 0.5 * ((2.0 * PI * v).ln() + e * e / v);
        });
        record.merge_inplace(Record::from_slice(&[
            ("nll", Scalar(nll / err.len().max(1) as f32)),
            ("sharpness", Scalar(var.mean().unwrap_or(0.0))),
            (
                "calibration_score",
                Scalar(calibration_score(
                    pred.mean.view(),
                    var.view(),
                    batch.next_state.view(),
                )),
            ),
        ]));
    }
    Ok(record)
}

/// Mean squared error of a reward model on `batch`.
pub fn evaluate_reward(model: &dyn RewardModel, batch: &TransitionBatch) -> Result<Record> {
    let r = model.reward(
        batch.state.view(),
        batch.action.view(),
        batch.next_state.view(),
    )?;
    let err = (&r - &batch.reward).insert_axis(Axis(1));
    Ok(Record::from_scalar("mse", mse(&err)))
}

fn mse(err: &Array2<f32>) -> f32 {
    err.mapv(|e| e * e).mean().unwrap_or(0.0)
}
