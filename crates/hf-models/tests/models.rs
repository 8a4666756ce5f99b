//! Models driven through the simulator, and loaded from disk.

use std::path::PathBuf;

use hf_core::{Tolerances, nearly_equal};
use hf_framework::{System, Value};
use hf_models::{AcrobotParams, AcrobotPlant, LoadError, ModelLoader, YamlModelLoader};
use hf_sim::{IntegratorType, Simulator, SimulatorConfig};

fn undamped() -> AcrobotParams {
    AcrobotParams {
        b1: 0.0,
        b2: 0.0,
        ..AcrobotParams::default()
    }
}

fn simulate_acrobot(params: AcrobotParams, x0: [f64; 4], duration: f64) -> (AcrobotPlant, Vec<f64>) {
    let plant = AcrobotPlant::new("acrobot", params.clone()).unwrap();
    let system = System::leaf(
        AcrobotPlant::new("acrobot", params)
            .unwrap()
            .with_initial_state(x0)
            .unwrap(),
    );
    let config = SimulatorConfig {
        integrator: IntegratorType::RK4,
        max_step_size: 1e-3,
        ..SimulatorConfig::default()
    };
    let mut sim = Simulator::with_config(system, config).unwrap();
    let (system, ctx) = sim.system_and_context_mut();
    system.fix_input_port(ctx, 0, Value::from_slice(&[0.0])).unwrap();
    sim.advance_to(duration).unwrap();
    (plant, sim.context().continuous_state().as_slice().to_vec())
}

#[test]
fn undamped_acrobot_conserves_energy() {
    let x0 = [1.0, -0.5, 0.0, 0.0];
    let (plant, x) = simulate_acrobot(undamped(), x0, 2.0);
    let e0 = plant.energy(&nalgebra::DVector::from_column_slice(&x0));
    let e1 = plant.energy(&nalgebra::DVector::from_column_slice(&x));
    let tol = Tolerances { abs: 1e-6, rel: 1e-6 };
    assert!(nearly_equal(e0, e1, tol), "{e0} -> {e1}");
}

#[test]
fn damping_dissipates_energy() {
    let x0 = [1.0, -0.5, 0.0, 0.0];
    let (plant, x) = simulate_acrobot(AcrobotParams::default(), x0, 2.0);
    let e0 = plant.energy(&nalgebra::DVector::from_column_slice(&x0));
    let e1 = plant.energy(&nalgebra::DVector::from_column_slice(&x));
    assert!(e1 < e0);
}

fn temp_model(name: &str, text: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("hf-models-{}-{name}", std::process::id()));
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn load_model_from_file() {
    let path = temp_model("di.yaml", "kind: double_integrator\nname: cart\n");
    let system = YamlModelLoader.load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(system.name(), "cart");
    assert_eq!(system.input_port_index("force"), Some(0));
}

#[test]
fn missing_file_is_io_error() {
    let err = YamlModelLoader
        .load(std::path::Path::new("/definitely/not/here.yaml"))
        .unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}
