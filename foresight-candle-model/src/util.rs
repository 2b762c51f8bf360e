//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarMap;
use foresight_core::record::{Record, RecordValue};
use log::trace;
use ndarray::{Array1, Array2, ArrayView2};

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track, tau = {}", tau);
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .ok_or_else(|| anyhow!("variable {} is missing in the source", k))?;
        let t = ((tau * v_src.as_tensor())? + ((1.0 - tau) * v_dest.as_tensor())?)?;
        v_dest.set(&t)?;
    }
    Ok(())
}

/// Returns the standard deviation of a tensor.
fn std(t: &Tensor) -> Result<f32> {
    Ok(t
        .broadcast_sub(&t.mean_all()?)?
        .sqr()?
        .mean_all()?
        .sqrt()?
        .to_scalar::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
pub fn param_stats(varmap: &VarMap) -> Result<Record> {
    let mut record = Record::empty();
    for (k, v) in varmap.data().lock().map_err(|e| anyhow!("{}", e))?.iter() {
        let m: f32 = v.mean_all()?.to_scalar()?;
        record.insert(format!("{}_mean", k), RecordValue::Scalar(m));
        record.insert(format!("{}_std", k), RecordValue::Scalar(std(v.as_tensor())?));
    }
    Ok(record)
}

/// Converts `[n, m]` array to a tensor on `device`.
pub fn array2_to_tensor(a: ArrayView2<f32>, device: &Device) -> Result<Tensor> {
    let v = a.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, a.dim(), device)?)
}

/// Converts a 2-dimensional tensor to an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let (n, m) = t.dims2()?;
    let v: Vec<f32> = t.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
    Ok(Array2::from_shape_vec((n, m), v)?)
}

/// Converts a tensor to a 1-dimensional array, flattening it.
pub fn tensor_to_array1(t: &Tensor) -> Result<Array1<f32>> {
    let v: Vec<f32> = t.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
    Ok(Array1::from(v))
}

/// Mean negative log-likelihood of `target` under a diagonal Gaussian with
/// `mean` and `log_std`, up to the constant `0.5 * log(2 pi)`.
pub fn gaussian_nll(mean: &Tensor, log_std: &Tensor, target: &Tensor) -> Result<Tensor> {
    let inv_var = (log_std * -2.0)?.exp()?;
    let sq = (target - mean)?.sqr()?;
    let nll = ((sq * inv_var)? * 0.5)? + log_std;
    Ok(nll?.mean_all()?)
}

/// Mean binary cross entropy of `target` (`0` or `1`) given `logits`.
pub fn binary_cross_entropy_with_logits(logits: &Tensor, target: &Tensor) -> Result<Tensor> {
    // max(x, 0) - x * y + log(1 + exp(-|x|))
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let loss = ((logits.relu()? - (logits * target)?)? + softplus)?;
    Ok(loss.mean_all()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;
    use ndarray::array;

    fn varmap_with(t: &Tensor) -> Result<VarMap> {
        let mut vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.set_one("var1", t)?;
        Ok(vm)
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + ((1.0 - tau) * &t_dest)?)?;

        let vm_src = varmap_with(&t_src)?;
        let vm_dest = varmap_with(&t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .clone();
        assert!((t - t_)?.abs()?.sum_all()?.to_scalar::<f32>()? < 1e-6);
        Ok(())
    }

    #[test]
    fn test_array_conversion() -> Result<()> {
        let a = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t = array2_to_tensor(a.view(), &Device::Cpu)?;
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(tensor_to_array2(&t)?, a);
        assert_eq!(tensor_to_array1(&t)?.len(), 6);
        Ok(())
    }

    #[test]
    fn test_losses() -> Result<()> {
        let zeros = Tensor::zeros((4, 1), DType::F32, &Device::Cpu)?;
        let ones = Tensor::ones((4, 1), DType::F32, &Device::Cpu)?;

        // Unit Gaussian at its mean.
        let nll = gaussian_nll(&zeros, &zeros, &zeros)?.to_scalar::<f32>()?;
        assert!(nll.abs() < 1e-6);

        // Zero logits give log(2) for either label.
        let bce = binary_cross_entropy_with_logits(&zeros, &ones)?.to_scalar::<f32>()?;
        assert!((bce - std::f32::consts::LN_2).abs() < 1e-5);

        let stats = param_stats(&varmap_with(&ones.reshape(4)?.narrow(0, 0, 3)?)?)?;
        assert_eq!(stats.get_scalar("var1_mean")?, 1.0);
        Ok(())
    }
}
