//! Fixed-step explicit integrators over a flat continuous state vector.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;

/// Source of time derivatives for an integrator.
///
/// Takes `&mut self` so implementations can reuse a scratch context.
pub trait ContinuousModel {
    fn derivatives(&mut self, t: f64, x: &DVector<f64>) -> SimResult<DVector<f64>>;
}

/// Trait for time integrators.
pub trait Integrator {
    /// Advance state by one time step.
    fn step<M: ContinuousModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
    ) -> SimResult<DVector<f64>>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: ContinuousModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
    ) -> SimResult<DVector<f64>> {
        let k1 = model.derivatives(t, x)?;
        let k2 = model.derivatives(t + 0.5 * dt, &(x + &k1 * (0.5 * dt)))?;
        let k3 = model.derivatives(t + 0.5 * dt, &(x + &k2 * (0.5 * dt)))?;
        let k4 = model.derivatives(t + dt, &(x + &k3 * dt))?;

        // x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        Ok(x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0))
    }
}

/// Forward Euler (explicit, 1st order, one derivative call per step).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: ContinuousModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
    ) -> SimResult<DVector<f64>> {
        let xdot = model.derivatives(t, x)?;
        Ok(x + xdot * dt)
    }
}

/// Integrator selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// 4th-order Runge-Kutta (default, 4 derivative calls per step).
    #[default]
    #[serde(rename = "rk4")]
    RK4,
    /// Forward Euler (1st-order, 1 derivative call per step).
    ForwardEuler,
}

impl IntegratorType {
    pub fn step<M: ContinuousModel>(
        self,
        model: &mut M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
    ) -> SimResult<DVector<f64>> {
        match self {
            IntegratorType::RK4 => RK4.step(model, t, x, dt),
            IntegratorType::ForwardEuler => ForwardEuler.step(model, t, x, dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// xdot = -x
    struct Decay;

    impl ContinuousModel for Decay {
        fn derivatives(&mut self, _t: f64, x: &DVector<f64>) -> SimResult<DVector<f64>> {
            Ok(-x)
        }
    }

    fn integrate(kind: IntegratorType, steps: usize) -> f64 {
        let dt = 1.0 / steps as f64;
        let mut x = DVector::from_vec(vec![1.0]);
        for k in 0..steps {
            x = kind.step(&mut Decay, k as f64 * dt, &x, dt).unwrap();
        }
        x[0]
    }

    #[test]
    fn rk4_matches_exponential() {
        let exact = (-1.0_f64).exp();
        assert!((integrate(IntegratorType::RK4, 10) - exact).abs() < 1e-6);
    }

    #[test]
    fn euler_is_first_order() {
        let exact = (-1.0_f64).exp();
        let coarse = (integrate(IntegratorType::ForwardEuler, 10) - exact).abs();
        let fine = (integrate(IntegratorType::ForwardEuler, 100) - exact).abs();
        assert!(fine < coarse / 5.0);
    }
}
