//! Sampled PI controller.
//!
//! Runs at a fixed period as a discrete update. Between samples the last
//! command is held, so the output has no direct feedthrough. Includes
//! output clamping, optional integral clamping and anti-windup (the
//! integral freezes while the output saturates).

use hf_framework::{
    DiscreteUpdate, Event, EvalResult, InputPorts, LeafContext, LeafSystem, PeriodicEvent,
    PortSpec, Value,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{PrimitiveError, PrimitiveResult};

/// PI gains and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral time constant (seconds). Larger values reduce integral action.
    pub ti: f64,
    pub out_min: f64,
    pub out_max: f64,
    /// Integral windup limit. If None, only anti-windup applies.
    #[serde(default)]
    pub integral_limit: Option<f64>,
}

impl PiGains {
    pub fn new(kp: f64, ti: f64, out_min: f64, out_max: f64) -> PrimitiveResult<Self> {
        if ti <= 0.0 {
            return Err(PrimitiveError::InvalidArg {
                what: "ti must be positive",
            });
        }
        if out_min >= out_max {
            return Err(PrimitiveError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        Ok(Self {
            kp,
            ti,
            out_min,
            out_max,
            integral_limit: None,
        })
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    /// One controller step. Returns (new integral, command).
    pub fn step(&self, integral: f64, measured: f64, setpoint: f64, dt: f64) -> (f64, f64) {
        // Positive error means the measurement is below the setpoint.
        let error = setpoint - measured;
        let p_term = self.kp * error;

        let ki = self.kp / self.ti;
        let mut new_integral = integral + error * dt;
        if let Some(limit) = self.integral_limit {
            new_integral = new_integral.clamp(-limit, limit);
        }

        let raw = p_term + ki * new_integral;
        let command = raw.clamp(self.out_min, self.out_max);
        let integral = if command == raw { new_integral } else { integral };
        (integral, command)
    }
}

/// PI controller leaf.
///
/// Inputs `measured` and `setpoint` (scalars), output `command`.
/// Discrete state group 0 holds `[integral, command]`.
pub struct PiController {
    name: String,
    gains: PiGains,
    event: PeriodicEvent,
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl PiController {
    pub fn new(name: impl Into<String>, gains: PiGains, period: f64) -> PrimitiveResult<Self> {
        Ok(Self {
            name: name.into(),
            gains,
            event: PeriodicEvent::discrete_update(period)?,
            inputs: vec![PortSpec::vector("measured", 1), PortSpec::vector("setpoint", 1)],
            outputs: vec![PortSpec::vector("command", 1)],
        })
    }

    pub fn gains(&self) -> &PiGains {
        &self.gains
    }
}

impl LeafSystem for PiController {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn default_discrete_state(&self) -> Vec<DVector<f64>> {
        let command = 0.0_f64.clamp(self.gains.out_min, self.gains.out_max);
        vec![DVector::from_vec(vec![0.0, command])]
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        vec![self.event]
    }

    fn has_direct_feedthrough(&self, _input: usize, _output: usize) -> bool {
        false
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        let state = ctx.discrete_state(0)?;
        Ok(Value::from_slice(&[state[1]]))
    }

    fn calc_discrete_update(
        &self,
        ctx: &LeafContext<'_>,
        inputs: &InputPorts<'_>,
        _event: &Event,
        update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        let integral = ctx.discrete_state(0)?[0];
        let measured = inputs.vector(0)?[0];
        let setpoint = inputs.vector(1)?[0];
        let (integral, command) = self
            .gains
            .step(integral, measured, setpoint, self.event.period);
        let group = update.group_mut(0)?;
        group[0] = integral;
        group[1] = command;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_framework::System;

    #[test]
    fn proportional_only_clamps() {
        // Very large Ti ~ P-only.
        let pi = PiGains::new(2.0, 1000.0, 0.0, 1.0).unwrap();
        let (_, command) = pi.step(0.0, 0.5, 1.0, 0.1);
        assert!((command - 1.0).abs() < 1e-6);
    }

    #[test]
    fn integral_accumulates() {
        let pi = PiGains::new(1.0, 1.0, 0.0, 10.0).unwrap();
        let mut integral = 0.0;
        for _ in 0..10 {
            integral = pi.step(integral, 0.0, 1.0, 0.1).0;
        }
        assert!(integral > 0.5);
    }

    #[test]
    fn saturation_freezes_integral() {
        let pi = PiGains::new(10.0, 1.0, 0.0, 1.0).unwrap();
        let (integral, command) = pi.step(0.0, 0.0, 10.0, 0.1);
        assert_eq!(command, 1.0);
        assert_eq!(integral, 0.0);
    }

    proptest::proptest! {
        #[test]
        fn command_stays_within_limits(
            kp in 0.1f64..20.0,
            ti in 0.05f64..10.0,
            limit in 0.1f64..5.0,
            errors in proptest::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..60),
        ) {
            let pi = PiGains::new(kp, ti, -1.0, 2.0).unwrap().with_integral_limit(limit);
            let mut integral = 0.0;
            for (measured, setpoint) in errors {
                let (next, command) = pi.step(integral, measured, setpoint, 0.01);
                proptest::prop_assert!((-1.0..=2.0).contains(&command));
                proptest::prop_assert!(next.abs() <= limit);
                // Anti-windup: a saturated step never moves the integral.
                if command == -1.0 || command == 2.0 {
                    let raw = kp * (setpoint - measured) + kp / ti * next;
                    proptest::prop_assert!(raw == command || next == integral);
                }
                integral = next;
            }
        }
    }

    #[test]
    fn invalid_gains() {
        assert!(PiGains::new(1.0, -1.0, 0.0, 1.0).is_err());
        assert!(PiGains::new(1.0, 1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn gains_from_yaml_like_json() {
        let gains: PiGains =
            serde_json::from_str(r#"{"kp": 1.0, "ti": 2.0, "out_min": -1.0, "out_max": 1.0}"#)
                .unwrap();
        assert_eq!(gains.integral_limit, None);
    }

    #[test]
    fn controller_updates_held_command() {
        let gains = PiGains::new(1.0, 1.0, -5.0, 5.0).unwrap();
        let system = System::leaf(PiController::new("pi", gains, 0.1).unwrap());
        let mut ctx = system.create_default_context();
        system.fix_input_port(&mut ctx, 0, Value::from_slice(&[0.0])).unwrap();
        system.fix_input_port(&mut ctx, 1, Value::from_slice(&[1.0])).unwrap();
        assert_eq!(system.compute_output(&ctx, 0).unwrap(), Value::from_slice(&[0.0]));

        let decl = &system.periodic_events()[0];
        let event = Event::periodic(decl, 0.0);
        let update = system.compute_discrete_update(&ctx, &event).unwrap();
        ctx.apply_discrete_update(event.owner, update).unwrap();
        // e = 1, p = 1, i = 1 * 0.1
        let command = system.compute_output(&ctx, 0).unwrap();
        assert!((command.as_vector().unwrap()[0] - 1.1).abs() < 1e-12);
    }
}
