//! Piecewise polynomial trajectories.

use nalgebra::{DMatrix, DVector};

use crate::error::{TrajOptError, TrajOptResult};

/// A vector-valued piecewise polynomial over `[breaks[0], breaks[last]]`.
///
/// Segment `k` covers `[breaks[k], breaks[k+1]]`; column `j` of its
/// coefficient matrix multiplies `(t - breaks[k])^j`.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewisePolynomial {
    breaks: Vec<f64>,
    coefficients: Vec<DMatrix<f64>>,
    rows: usize,
}

impl PiecewisePolynomial {
    /// Linear interpolation between samples.
    pub fn first_order_hold(breaks: &[f64], samples: &[DVector<f64>]) -> TrajOptResult<Self> {
        let rows = validate_samples(breaks, samples, "samples")?;
        let coefficients = breaks
            .windows(2)
            .zip(samples.windows(2))
            .map(|(t, x)| {
                let h = t[1] - t[0];
                let slope = (&x[1] - &x[0]) / h;
                DMatrix::from_columns(&[x[0].clone(), slope])
            })
            .collect();
        Ok(Self {
            breaks: breaks.to_vec(),
            coefficients,
            rows,
        })
    }

    /// Cubic segments matching both value and derivative at every break.
    pub fn cubic_hermite(
        breaks: &[f64],
        samples: &[DVector<f64>],
        derivatives: &[DVector<f64>],
    ) -> TrajOptResult<Self> {
        let rows = validate_samples(breaks, samples, "samples")?;
        if validate_samples(breaks, derivatives, "derivatives")? != rows {
            return Err(TrajOptError::InvalidTrajectory {
                what: "derivatives and samples have different widths".to_string(),
            });
        }

        let mut coefficients = Vec::with_capacity(breaks.len() - 1);
        for k in 0..breaks.len() - 1 {
            let h = breaks[k + 1] - breaks[k];
            let (x0, x1) = (&samples[k], &samples[k + 1]);
            let (d0, d1) = (&derivatives[k], &derivatives[k + 1]);
            let delta = (x1 - x0) / h;
            let c2 = (&delta * 3.0 - d0 * 2.0 - d1) / h;
            let c3 = (&delta * -2.0 + d0 + d1) / (h * h);
            coefficients.push(DMatrix::from_columns(&[x0.clone(), d0.clone(), c2, c3]));
        }
        Ok(Self {
            breaks: breaks.to_vec(),
            coefficients,
            rows,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    pub fn start_time(&self) -> f64 {
        self.breaks[0]
    }

    pub fn end_time(&self) -> f64 {
        self.breaks[self.breaks.len() - 1]
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    /// Value at `t`, held at the first or last value outside the breaks.
    pub fn value(&self, t: f64) -> DVector<f64> {
        let t = t.clamp(self.start_time(), self.end_time());
        let segment = self
            .breaks
            .partition_point(|&b| b <= t)
            .saturating_sub(1)
            .min(self.coefficients.len() - 1);
        let tau = t - self.breaks[segment];
        let coeffs = &self.coefficients[segment];

        // Horner
        let mut value = coeffs.column(coeffs.ncols() - 1).into_owned();
        for j in (0..coeffs.ncols() - 1).rev() {
            value = value * tau + coeffs.column(j);
        }
        value
    }
}

fn validate_samples(breaks: &[f64], samples: &[DVector<f64>], what: &str) -> TrajOptResult<usize> {
    if breaks.len() < 2 {
        return Err(TrajOptError::InvalidTrajectory {
            what: "at least two breaks are required".to_string(),
        });
    }
    if breaks.iter().any(|t| !t.is_finite()) || breaks.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TrajOptError::InvalidTrajectory {
            what: "breaks must be finite and strictly increasing".to_string(),
        });
    }
    if samples.len() != breaks.len() {
        return Err(TrajOptError::InvalidTrajectory {
            what: format!("{} {what} for {} breaks", samples.len(), breaks.len()),
        });
    }
    let rows = samples[0].len();
    if samples.iter().any(|s| s.len() != rows) {
        return Err(TrajOptError::InvalidTrajectory {
            what: format!("{what} have inconsistent widths"),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scalar(v: f64) -> DVector<f64> {
        DVector::from_element(1, v)
    }

    #[test]
    fn first_order_hold_interpolates() {
        let traj = PiecewisePolynomial::first_order_hold(
            &[0.0, 1.0, 3.0],
            &[scalar(0.0), scalar(2.0), scalar(-2.0)],
        )
        .unwrap();

        assert_eq!(traj.rows(), 1);
        assert!((traj.value(0.5)[0] - 1.0).abs() < 1e-12);
        assert!((traj.value(1.0)[0] - 2.0).abs() < 1e-12);
        assert!((traj.value(2.0)[0] - 0.0).abs() < 1e-12);
        assert!((traj.value(3.0)[0] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn cubic_hermite_reproduces_cubic() {
        let breaks = [0.0, 0.5, 2.0];
        let samples: Vec<_> = breaks.iter().map(|&t| scalar(t * t * t - t)).collect();
        let derivs: Vec<_> = breaks.iter().map(|&t| scalar(3.0 * t * t - 1.0)).collect();
        let traj = PiecewisePolynomial::cubic_hermite(&breaks, &samples, &derivs).unwrap();

        for t in [0.1, 0.5, 0.9, 1.7, 2.0] {
            assert!((traj.value(t)[0] - (t * t * t - t)).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_bad_breaks() {
        assert!(PiecewisePolynomial::first_order_hold(&[0.0], &[scalar(1.0)]).is_err());
        assert!(
            PiecewisePolynomial::first_order_hold(&[0.0, 0.0], &[scalar(1.0), scalar(2.0)])
                .is_err()
        );
        assert!(PiecewisePolynomial::first_order_hold(&[0.0, 1.0], &[scalar(1.0)]).is_err());
    }

    proptest! {
        #[test]
        fn value_is_clamped_outside_breaks(
            a in -5.0..5.0f64,
            b in -5.0..5.0f64,
            end in 0.1..10.0f64,
            t in -100.0..100.0f64,
        ) {
            let traj = PiecewisePolynomial::first_order_hold(&[0.0, end], &[scalar(a), scalar(b)]).unwrap();
            let v = traj.value(t)[0];
            if t <= 0.0 {
                prop_assert!((v - a).abs() < 1e-12);
            } else if t >= end {
                prop_assert!((v - b).abs() < 1e-9);
            } else {
                prop_assert!(v >= a.min(b) - 1e-9 && v <= a.max(b) + 1e-9);
            }
        }
    }
}
