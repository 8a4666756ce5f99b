//! Mock station: a two-joint plant that talks to the outside world only
//! through command and status topics.
//!
//! ```text
//! ARM_COMMAND -> command_subscriber -> [station: PD + two joints] -> status_publisher -> ARM_STATUS
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use hf_core::units::kg;
use hf_framework::{Diagram, DiagramBuilder, System};
use hf_messaging::{
    InMemoryTransport, MessageTransport, VectorMessage, VectorPublisher, VectorSubscriber,
};
use hf_models::DoubleIntegrator;
use hf_primitives::{Demultiplexer, MatrixGain, Multiplexer};
use hf_sim::{Simulator, SimulatorConfig, SimulatorState};
use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

pub const COMMAND_TOPIC: &str = "ARM_COMMAND";
pub const STATUS_TOPIC: &str = "ARM_STATUS";
const PERIOD: f64 = 0.005;
const KP: f64 = 100.0;
const KD: f64 = 20.0;
const HOME: [f64; 2] = [0.6, -1.0];

/// PD-controlled joints with input `position_command` (2) and output
/// `state_estimated` (`[q0, q0dot, q1, q1dot]`).
pub fn build_station(home: [f64; 2]) -> CliResult<Diagram> {
    let mut b = DiagramBuilder::new("station");

    // Columns: [cmd0, cmd1, q0, q0dot, q1, q1dot]
    #[rustfmt::skip]
    let gains = DMatrix::from_row_slice(2, 6, &[
        KP, 0.0, -KP, -KD, 0.0, 0.0,
        0.0, KP, 0.0, 0.0, -KP, -KD,
    ]);
    let feedback = b.add_leaf(Multiplexer::new("feedback", &[2, 2, 2])?)?;
    let pd = b.add_leaf(MatrixGain::new("pd", gains))?;
    let split = b.add_leaf(Demultiplexer::uniform("split", 2, 1)?)?;
    let status = b.add_leaf(Multiplexer::new("status", &[2, 2])?)?;

    b.connect_by_name(feedback, "y", pd, "u")?;
    b.connect_by_name(pd, "y", split, "u")?;
    for (i, q) in home.into_iter().enumerate() {
        let joint = b.add_leaf(DoubleIntegrator::new(format!("joint{i}"), kg(1.0))?.with_initial_state(q, 0.0)?)?;
        b.connect_by_name(split, &format!("y{i}"), joint, "force")?;
        b.connect_by_name(joint, "state", feedback, &format!("u{}", i + 1))?;
        b.connect_by_name(joint, "state", status, &format!("u{i}"))?;
    }

    let command = b.input(feedback, "u0")?;
    b.export_input(command, "position_command")?;
    let state = b.output(status, "y")?;
    b.export_output(state, "state_estimated")?;
    Ok(b.build()?)
}

/// Station wired to `transport` through its command and status topics.
pub fn build_mock_station(transport: &Arc<InMemoryTransport>) -> CliResult<System> {
    let mut b = DiagramBuilder::new("mock_station");
    let subscriber = b.add_leaf(VectorSubscriber::new(
        "command_subscriber",
        COMMAND_TOPIC,
        transport.clone(),
        &HOME,
        PERIOD,
    )?)?;
    let station = b.add_diagram(build_station(HOME)?)?;
    let publisher = b.add_leaf(VectorPublisher::new("status_publisher", STATUS_TOPIC, transport.clone(), 4, PERIOD)?)?;
    b.connect_by_name(subscriber, "y", station, "position_command")?;
    b.connect_by_name(station, "state_estimated", publisher, "u")?;
    Ok(System::from(b.build()?))
}

/// Stand-in for a remote operator: alternates between two targets on
/// `COMMAND_TOPIC` until `stop` is set.
fn spawn_operator(transport: Arc<InMemoryTransport>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let targets = [[0.0, 0.5], HOME];
        let mut sent = 0usize;
        while !stop.load(Ordering::Relaxed) {
            let target = targets[sent % targets.len()];
            let payload = VectorMessage::new(0.0, target.to_vec()).encode();
            match payload.map(|bytes| transport.publish(COMMAND_TOPIC, bytes)) {
                Ok(Ok(())) => debug!(?target, "operator command sent"),
                Ok(Err(e)) | Err(e) => debug!(error = %e, "operator command dropped"),
            }
            sent += 1;
            thread::sleep(Duration::from_millis(500));
        }
    })
}

pub fn run(duration: f64, config: SimulatorConfig) -> CliResult<()> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(CliError::InvalidArg(format!("duration must be positive, got {duration}")));
    }
    let transport = Arc::new(InMemoryTransport::new());
    let system = build_mock_station(&transport)?;
    let mut sim = Simulator::with_config(system, config)?;
    sim.initialize()?;

    let stop = Arc::new(AtomicBool::new(false));
    let operator = spawn_operator(transport.clone(), stop.clone());
    let outcome = sim.advance_to(duration);
    stop.store(true, Ordering::Relaxed);
    // The operator only sleeps and publishes; a panic there is not ours to report.
    let _ = operator.join();
    outcome?;

    if sim.state() != SimulatorState::Stopped {
        return Err(CliError::Unfinished(sim.state()));
    }
    let stats = sim.stats();
    info!(?stats, "station finished");
    let status_count = transport.publish_count(STATUS_TOPIC);
    println!(
        "Station ran to t={:.3}: {} status messages, {} steps, {} pacing overruns",
        sim.time(),
        status_count,
        stats.integration_steps,
        stats.pacing_overruns
    );
    if let Some(last) = transport.last_published(STATUS_TOPIC) {
        println!("Last status: {:?}", VectorMessage::decode(&last)?.values);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_diagram_shape() {
        let station = build_station(HOME).unwrap();
        assert_eq!(station.input_specs().len(), 1);
        assert_eq!(station.output_specs()[0].name, "state_estimated");
        // Joints break the feedback loop.
        assert!(!station.has_direct_feedthrough(0, 0));
    }

    #[test]
    fn joints_track_published_commands() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut sim = Simulator::new(build_mock_station(&transport).unwrap());
        sim.initialize().unwrap();

        sim.advance_to(0.1).unwrap();
        let first = VectorMessage::decode(&transport.published(STATUS_TOPIC)[0]).unwrap();
        assert_eq!(first.values, vec![HOME[0], 0.0, HOME[1], 0.0]);

        transport
            .publish(COMMAND_TOPIC, VectorMessage::new(0.1, vec![0.0, 0.5]).encode().unwrap())
            .unwrap();
        sim.advance_to(2.0).unwrap();

        let last = transport.last_published(STATUS_TOPIC).unwrap();
        let state = VectorMessage::decode(&last).unwrap().values;
        assert!(state[0].abs() < 1e-2, "{state:?}");
        assert!((state[2] - 0.5).abs() < 1e-2, "{state:?}");
        // 0, 0.005, ..., 2.0
        assert_eq!(transport.publish_count(STATUS_TOPIC), 401);
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(matches!(
            run(0.0, SimulatorConfig::default()),
            Err(CliError::InvalidArg(_))
        ));
    }
}
