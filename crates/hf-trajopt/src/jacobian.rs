//! Finite-difference derivatives.
//!
//! Columns are independent, so each is evaluated on the rayon pool.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::TrajOptResult;

fn perturbation(x: f64, epsilon: f64) -> f64 {
    epsilon * x.abs().max(1.0)
}

/// Jacobian of `f` at `x` by forward differences.
///
/// `f_x` must be `f(x)`; callers usually have it already.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> TrajOptResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> TrajOptResult<DVector<f64>> + Sync,
{
    let n = x.len();
    let m = f_x.len();
    if n == 0 || m == 0 {
        return Ok(DMatrix::zeros(m, n));
    }

    let columns = (0..n)
        .into_par_iter()
        .map(|j| {
            let mut x_perturbed = x.clone();
            let dx = perturbation(x[j], epsilon);
            x_perturbed[j] += dx;
            let f_perturbed = f(&x_perturbed)?;
            Ok((f_perturbed - f_x) / dx)
        })
        .collect::<TrajOptResult<Vec<DVector<f64>>>>()?;

    Ok(DMatrix::from_columns(&columns))
}

/// Gradient and Hessian diagonal of a scalar function by central differences.
pub fn gradient_and_curvature<F>(
    x: &DVector<f64>,
    f_x: f64,
    f: F,
    epsilon: f64,
) -> TrajOptResult<(DVector<f64>, DVector<f64>)>
where
    F: Fn(&DVector<f64>) -> TrajOptResult<f64> + Sync,
{
    let pairs = (0..x.len())
        .into_par_iter()
        .map(|j| {
            let dx = perturbation(x[j], epsilon);
            let mut x_plus = x.clone();
            x_plus[j] += dx;
            let mut x_minus = x.clone();
            x_minus[j] -= dx;
            let f_plus = f(&x_plus)?;
            let f_minus = f(&x_minus)?;
            Ok((
                (f_plus - f_minus) / (2.0 * dx),
                (f_plus - 2.0 * f_x + f_minus) / (dx * dx),
            ))
        })
        .collect::<TrajOptResult<Vec<(f64, f64)>>>()?;

    let gradient = DVector::from_iterator(pairs.len(), pairs.iter().map(|p| p.0));
    let curvature = DVector::from_iterator(pairs.len(), pairs.iter().map(|p| p.1));
    Ok((gradient, curvature))
}
