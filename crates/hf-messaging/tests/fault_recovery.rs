//! Integration test: a fault at an event instant must not lose received data.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hf_framework::{
    DiagramBuilder, DiscreteUpdate, EvalError, EvalResult, Event, InputPorts, LeafContext,
    LeafSystem, PeriodicEvent, System, Value,
};
use hf_messaging::{InMemoryTransport, MessageTransport, VectorMessage, VectorSubscriber};
use hf_sim::{SimError, Simulator, SimulatorState};

/// Discrete-update leaf that fails the first time it runs at `fail_at`.
struct FailOnce {
    fail_at: f64,
    failed: AtomicBool,
}

impl LeafSystem for FailOnce {
    fn name(&self) -> &str {
        "fail_once"
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        PeriodicEvent::discrete_update(0.1).into_iter().collect()
    }

    fn calc_discrete_update(
        &self,
        ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        _event: &Event,
        _update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        if (ctx.time() - self.fail_at).abs() < 1e-9 && !self.failed.swap(true, Ordering::SeqCst) {
            return Err(EvalError::domain("fail_once", "transient"));
        }
        Ok(())
    }
}

#[test]
fn message_survives_a_fault_at_the_same_instant() {
    let transport = Arc::new(InMemoryTransport::new());
    let mut b = DiagramBuilder::new("root");
    let sub = b
        .add_leaf(VectorSubscriber::new("sub", "command", transport.clone(), &[0.0], 0.1).unwrap())
        .unwrap();
    b.add_leaf(FailOnce {
        fail_at: 0.2,
        failed: AtomicBool::new(false),
    })
    .unwrap();
    let y = b.output(sub, "y").unwrap();
    b.export_output(y, "command").unwrap();
    let mut sim = Simulator::new(System::from(b.build().unwrap()));

    sim.advance_to(0.15).unwrap();
    transport
        .publish("command", VectorMessage::new(0.15, vec![7.0]).encode().unwrap())
        .unwrap();

    let err = sim.advance_to(0.3).unwrap_err();
    assert!(matches!(err, SimError::Evaluation(EvalError::Domain { .. })));
    assert_eq!(sim.state(), SimulatorState::Faulted);
    assert_eq!(sim.time(), 0.15);
    let held = sim.system().compute_output(sim.context(), 0).unwrap();
    assert_eq!(held, Value::from_slice(&[0.0]));

    sim.initialize().unwrap();
    sim.advance_to(0.5).unwrap();
    let y = sim.system().compute_output(sim.context(), 0).unwrap();
    assert_eq!(y, Value::from_slice(&[7.0]));
}
