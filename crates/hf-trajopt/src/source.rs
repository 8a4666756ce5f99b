//! Bridge from optimized trajectories into simulations.

use hf_core::{Tolerances, nearly_equal};
use hf_framework::{EvalResult, InputPorts, LeafContext, LeafSystem, PortSpec, Value};

use crate::error::{TrajOptError, TrajOptResult};
use crate::trajectory::PiecewisePolynomial;

/// Output-only leaf replaying a trajectory on output `value`.
///
/// The trajectory is evaluated at the context time and holds its end values
/// outside its breaks, so simulations may run past `end_time`.
pub struct TrajectorySource {
    name: String,
    trajectory: PiecewisePolynomial,
    outputs: Vec<PortSpec>,
}

impl TrajectorySource {
    pub fn new(name: impl Into<String>, trajectory: PiecewisePolynomial) -> Self {
        let outputs = vec![PortSpec::vector("value", trajectory.rows())];
        Self {
            name: name.into(),
            trajectory,
            outputs,
        }
    }

    pub fn trajectory(&self) -> &PiecewisePolynomial {
        &self.trajectory
    }
}

impl LeafSystem for TrajectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(self.trajectory.value(ctx.time())))
    }
}

/// Fail with `BoundsViolation` if the trajectory's duration is outside
/// `[t_min, t_max]` by more than rounding.
pub fn check_duration(trajectory: &PiecewisePolynomial, t_min: f64, t_max: f64) -> TrajOptResult<()> {
    let duration = trajectory.duration();
    let tol = Tolerances::default();
    let below = duration < t_min && !nearly_equal(duration, t_min, tol);
    let above = duration > t_max && !nearly_equal(duration, t_max, tol);
    if below || above {
        return Err(TrajOptError::BoundsViolation {
            duration,
            t_min,
            t_max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::System;
    use nalgebra::DVector;

    fn ramp() -> PiecewisePolynomial {
        PiecewisePolynomial::first_order_hold(
            &[0.0, 2.0],
            &[DVector::from_vec(vec![0.0, 1.0]), DVector::from_vec(vec![4.0, 1.0])],
        )
        .unwrap()
    }

    #[test]
    fn output_follows_time_and_holds() {
        let system = System::leaf(TrajectorySource::new("traj", ramp()));
        let mut ctx = system.create_default_context();

        ctx.set_time(1.0);
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[2.0, 1.0]));

        ctx.set_time(5.0);
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[4.0, 1.0]));

        ctx.set_time(-1.0);
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[0.0, 1.0]));
    }

    #[test]
    fn duration_check() {
        let traj = ramp();
        assert!(check_duration(&traj, 1.0, 3.0).is_ok());
        assert!(check_duration(&traj, 2.0, 2.0).is_ok());
        assert!(check_duration(&traj, 2.0 + 1e-12, 3.0).is_ok());
        assert_eq!(
            check_duration(&traj, 2.5, 3.0),
            Err(TrajOptError::BoundsViolation {
                duration: 2.0,
                t_min: 2.5,
                t_max: 3.0
            })
        );
    }
}
