//! Dense Cholesky factorization and triangular solves.
use crate::error::ForesightError;
use anyhow::Result;
use log::debug;
use ndarray::{Array2, ArrayView2};

/// Lower-triangular `L` with `L L^T = a`, or `None` if `a` is not positive definite.
fn cholesky(a: &ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if d <= 0.0 || !d.is_finite() {
            return None;
        }
        let d = d.sqrt();
        l[[j, j]] = d;
        for i in (j + 1)..n {
            let mut v = a[[i, j]];
            for k in 0..j {
                v -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = v / d;
        }
    }
    Some(l)
}

/// Cholesky factor of `a`, adding increasing multiples of `jitter` to the
/// diagonal until the factorization succeeds.
pub(super) fn cholesky_with_jitter(a: &Array2<f64>, jitter: f64) -> Result<Array2<f64>> {
    if let Some(l) = cholesky(&a.view()) {
        return Ok(l);
    }
    let mut eps = jitter;
    for _ in 0..6 {
        let mut b = a.clone();
        b.diag_mut().mapv_inplace(|d| d + eps);
        if let Some(l) = cholesky(&b.view()) {
            debug!("Cholesky succeeded with jitter {}", eps);
            return Ok(l);
        }
        eps *= 10.0;
    }
    Err(ForesightError::Numerical(format!(
        "matrix of size {} is not positive definite even with jitter {}",
        a.nrows(),
        eps
    ))
    .into())
}

/// Solves `L x = b` for lower-triangular `L`, column by column.
pub(super) fn solve_lower(l: &Array2<f64>, b: &ArrayView2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut x = b.to_owned();
    for c in 0..x.ncols() {
        for i in 0..n {
            let mut v = x[[i, c]];
            for k in 0..i {
                v -= l[[i, k]] * x[[k, c]];
            }
            x[[i, c]] = v / l[[i, i]];
        }
    }
    x
}

/// Solves `L^T x = b` for lower-triangular `L`.
pub(super) fn solve_lower_transposed(l: &Array2<f64>, b: &ArrayView2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut x = b.to_owned();
    for c in 0..x.ncols() {
        for i in (0..n).rev() {
            let mut v = x[[i, c]];
            for k in (i + 1)..n {
                v -= l[[k, i]] * x[[k, c]];
            }
            x[[i, c]] = v / l[[i, i]];
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd_system() -> Result<()> {
        let a = array![[4.0, 2.0, 0.4], [2.0, 3.0, 0.5], [0.4, 0.5, 2.0]];
        let b = array![[1.0], [2.0], [3.0]];
        let l = cholesky_with_jitter(&a, 1e-8)?;
        assert!((l.dot(&l.t()) - &a).iter().all(|d| d.abs() < 1e-10));

        let x = solve_lower_transposed(&l, &solve_lower(&l, &b.view()).view());
        assert!((a.dot(&x) - &b).iter().all(|d| d.abs() < 1e-10));
        Ok(())
    }

    #[test]
    fn test_singular_matrix_needs_jitter() -> Result<()> {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(cholesky(&a.view()).is_none());
        let l = cholesky_with_jitter(&a, 1e-6)?;
        assert!(l[[1, 1]] > 0.0);
        Ok(())
    }
}
