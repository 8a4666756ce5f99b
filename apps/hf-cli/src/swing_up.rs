//! Acrobot swing-up: optimize, check, replay.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;

use hf_framework::{DiagramBuilder, System};
use hf_messaging::{InMemoryTransport, VectorMessage, VectorPublisher};
use hf_models::{AcrobotParams, AcrobotPlant, ModelLoader, YamlModelLoader};
use hf_sim::{Simulator, SimulatorConfig, SimulatorState};
use hf_trajopt::{
    DirectCollocation, PiecewisePolynomial, SolutionResult, SolverOptions, TrajectorySource,
    check_duration,
};
use nalgebra::DVector;
use tracing::info;

use crate::error::{CliError, CliResult, read_file};

pub const STATE_TOPIC: &str = "ACROBOT_STATE";
const PUBLISH_PERIOD: f64 = 1.0 / 60.0;
const TORQUE_LIMIT: f64 = 8.0;
const INPUT_WEIGHT: f64 = 10.0;
const GUESS_DURATION: f64 = 4.0;

pub struct SwingUpArgs {
    pub samples: usize,
    pub t_min: f64,
    pub t_max: f64,
    pub model: Option<PathBuf>,
    pub solver_config: Option<PathBuf>,
    pub config: SimulatorConfig,
}

fn load_plant(model: Option<&PathBuf>) -> CliResult<System> {
    let plant = match model {
        Some(path) => YamlModelLoader.load(path)?,
        None => System::leaf(AcrobotPlant::new("acrobot", AcrobotParams::default())?),
    };
    if plant.continuous_state_size() != 4 || plant.num_input_ports() != 1 {
        return Err(CliError::InvalidArg(format!(
            "model '{}' is not an acrobot (4 states, 1 input)",
            plant.name()
        )));
    }
    Ok(plant)
}

/// Solve the swing-up from hanging at rest to upright at rest.
pub fn optimize(
    plant: &System,
    samples: usize,
    t_min: f64,
    t_max: f64,
    options: SolverOptions,
) -> CliResult<PiecewisePolynomial> {
    let x0 = [0.0; 4];
    let xg = [PI, 0.0, 0.0, 0.0];

    let ctx = plant.create_default_context();
    let mut dircol = DirectCollocation::new(plant, &ctx, samples, t_min, t_max)?;
    dircol.set_solver_options(options);
    dircol.add_input_bounds(&[-TORQUE_LIMIT], &[TORQUE_LIMIT])?;
    dircol.add_initial_state_constraint(&x0)?;
    dircol.add_final_state_constraint(&xg)?;
    dircol.add_running_cost(|_x, u| INPUT_WEIGHT * u[0] * u[0]);

    let guess = PiecewisePolynomial::first_order_hold(
        &[0.0, GUESS_DURATION],
        &[DVector::from_column_slice(&x0), DVector::from_column_slice(&xg)],
    )?;
    dircol.set_initial_trajectory(None, Some(guess))?;

    let result = dircol.solve()?;
    if result != SolutionResult::SolutionFound {
        return Err(CliError::NoSolution(result));
    }
    Ok(dircol.reconstruct_state_trajectory()?)
}

pub fn run(args: &SwingUpArgs) -> CliResult<()> {
    let plant = load_plant(args.model.as_ref())?;
    let options = match &args.solver_config {
        Some(path) => serde_yaml::from_str(&read_file(path)?)?,
        None => SolverOptions::default(),
    };

    let trajectory = optimize(&plant, args.samples, args.t_min, args.t_max, options)?;
    check_duration(&trajectory, args.t_min, args.t_max)?;
    let duration = trajectory.end_time();
    println!("Swing-up found: duration {duration:.3} s");

    let transport = Arc::new(InMemoryTransport::new());
    let system = replay_system(trajectory, &transport)?;
    let mut sim = Simulator::with_config(system, args.config.clone())?;
    replay(&mut sim, args.t_max)?;

    let frames = transport.publish_count(STATE_TOPIC);
    info!(frames, "replay finished");
    if let Some(last) = transport.last_published(STATE_TOPIC) {
        let message = VectorMessage::decode(&last)?;
        println!(
            "Replayed {frames} frames; final state at t={:.3}: {:?}",
            message.timestamp, message.values
        );
    }
    Ok(())
}

/// Trajectory source feeding a state publisher on `STATE_TOPIC`.
fn replay_system(trajectory: PiecewisePolynomial, transport: &Arc<InMemoryTransport>) -> CliResult<System> {
    let width = trajectory.rows();
    let mut builder = DiagramBuilder::new("swing_up_replay");
    let source = builder.add_leaf(TrajectorySource::new("trajectory", trajectory))?;
    let publisher = builder.add_leaf(VectorPublisher::new(
        "state_publisher",
        STATE_TOPIC,
        transport.clone(),
        width,
        PUBLISH_PERIOD,
    )?)?;
    builder.connect_by_name(source, "value", publisher, "u")?;
    Ok(System::from(builder.build()?))
}

/// Play the trajectory through to `t_max`; past its end the source holds
/// the final state.
fn replay(sim: &mut Simulator, t_max: f64) -> CliResult<()> {
    sim.initialize()?;
    sim.advance_to(t_max)?;
    if sim.state() != SimulatorState::Stopped {
        return Err(CliError::Unfinished(sim.state()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_models::DoubleIntegrator;

    #[test]
    fn rejects_non_acrobot_models() {
        let dir = std::env::temp_dir().join(format!("hf-cli-{}-di.yaml", std::process::id()));
        std::fs::write(&dir, "kind: double_integrator\n").unwrap();
        let err = load_plant(Some(&dir)).unwrap_err();
        std::fs::remove_file(&dir).unwrap();
        assert!(matches!(err, CliError::InvalidArg(_)));

        assert!(load_plant(None).is_ok());
    }

    #[test]
    fn iteration_limit_is_reported_as_no_solution() {
        let plant = load_plant(None).unwrap();
        let options = SolverOptions {
            max_outer_iterations: 1,
            max_inner_iterations: 1,
            ..SolverOptions::default()
        };
        let err = optimize(&plant, 5, 2.0, 10.0, options).unwrap_err();
        assert!(matches!(err, CliError::NoSolution(_)));
    }

    #[test]
    fn replay_holds_final_state_until_t_max() {
        let start = DVector::zeros(4);
        let end = DVector::from_vec(vec![PI, 0.0, 0.0, 0.0]);
        let trajectory = PiecewisePolynomial::first_order_hold(&[0.0, 1.0], &[start, end.clone()]).unwrap();
        let transport = Arc::new(InMemoryTransport::new());
        let system = replay_system(trajectory, &transport).unwrap();
        let mut sim = Simulator::new(system);

        replay(&mut sim, 2.0).unwrap();
        assert_eq!(sim.time(), 2.0);
        assert!(transport.publish_count(STATE_TOPIC) >= 120);
        let last = VectorMessage::decode(&transport.last_published(STATE_TOPIC).unwrap()).unwrap();
        assert!(last.timestamp > 1.9, "{}", last.timestamp);
        for (held, expected) in last.values.iter().zip(end.iter()) {
            assert!((held - expected).abs() < 1e-12, "{:?}", last.values);
        }
    }

    #[test]
    fn non_acrobot_plant_fails_setup() {
        let plant = System::leaf(DoubleIntegrator::unit("cart"));
        let err = optimize(&plant, 5, 1.0, 2.0, SolverOptions::default()).unwrap_err();
        assert!(matches!(err, CliError::TrajOpt(_)));
    }
}
