//! Simulator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::integrator::IntegratorType;
use crate::pacing::{NoPacing, Pacer, RealtimePacer};

/// Options for the simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub integrator: IntegratorType,
    /// Largest integration substep (seconds).
    pub max_step_size: f64,
    /// Sim seconds per wall second; 0 disables pacing.
    pub target_realtime_rate: f64,
    /// Longest single pacing sleep (seconds).
    pub max_pacing_sleep: f64,
    /// Also call every system's publish hook after each committed interval.
    pub publish_every_time_step: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            integrator: IntegratorType::default(),
            max_step_size: 1e-3,
            target_realtime_rate: 0.0,
            max_pacing_sleep: 0.05,
            publish_every_time_step: false,
        }
    }
}

impl SimulatorConfig {
    pub fn from_yaml_str(text: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.max_step_size.is_finite() || self.max_step_size <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "max_step_size must be positive",
            });
        }
        if !self.target_realtime_rate.is_finite() || self.target_realtime_rate < 0.0 {
            return Err(SimError::InvalidArg {
                what: "target_realtime_rate must be non-negative",
            });
        }
        if !self.max_pacing_sleep.is_finite() || self.max_pacing_sleep <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "max_pacing_sleep must be positive",
            });
        }
        Ok(())
    }

    /// Pacer implied by `target_realtime_rate`.
    pub fn pacer(&self) -> Box<dyn Pacer> {
        if self.target_realtime_rate > 0.0 {
            Box::new(RealtimePacer::new(
                self.target_realtime_rate,
                Duration::from_secs_f64(self.max_pacing_sleep),
            ))
        } else {
            Box::new(NoPacing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.integrator, IntegratorType::RK4);
        assert_eq!(config.max_step_size, 1e-3);
        assert_eq!(config.target_realtime_rate, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let config = SimulatorConfig::from_yaml_str(
            "integrator: forward_euler\nmax_step_size: 0.01\npublish_every_time_step: true\n",
        )
        .unwrap();
        assert_eq!(config.integrator, IntegratorType::ForwardEuler);
        assert_eq!(config.max_step_size, 0.01);
        assert!(config.publish_every_time_step);
        assert_eq!(config.max_pacing_sleep, 0.05);
    }

    #[test]
    fn invalid_yaml_values() {
        assert!(matches!(
            SimulatorConfig::from_yaml_str("max_step_size: -1.0\n"),
            Err(SimError::InvalidArg { .. })
        ));
        assert!(matches!(
            SimulatorConfig::from_yaml_str("integrator: [1, 2]\n"),
            Err(SimError::Config { .. })
        ));
    }
}
