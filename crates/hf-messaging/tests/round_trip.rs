//! Integration test: subscriber -> gain -> publisher inside a simulated diagram.

use std::sync::Arc;

use hf_framework::{DiagramBuilder, System};
use hf_messaging::{InMemoryTransport, MessageTransport, VectorMessage, VectorPublisher, VectorSubscriber};
use hf_primitives::Gain;
use hf_sim::Simulator;

#[test]
fn commands_flow_through_the_diagram() {
    let transport = Arc::new(InMemoryTransport::new());

    let mut b = DiagramBuilder::new("station");
    let sub = b
        .add_leaf(VectorSubscriber::new("sub", "command", transport.clone(), &[0.0], 0.1).unwrap())
        .unwrap();
    let gain = b.add_leaf(Gain::new("gain", 2.0, 1).unwrap()).unwrap();
    let publisher = b
        .add_leaf(VectorPublisher::new("pub", "status", transport.clone(), 1, 0.1).unwrap())
        .unwrap();
    b.connect_by_name(sub, "y", gain, "u").unwrap();
    b.connect_by_name(gain, "y", publisher, "u").unwrap();
    let mut sim = Simulator::new(System::from(b.build().unwrap()));

    sim.advance_to(0.15).unwrap();
    transport
        .publish("command", VectorMessage::new(0.0, vec![3.0]).encode().unwrap())
        .unwrap();
    sim.advance_to(0.3).unwrap();

    let status: Vec<VectorMessage> = transport
        .published("status")
        .iter()
        .map(|p| VectorMessage::decode(p).unwrap())
        .collect();
    let values: Vec<f64> = status.iter().map(|m| m.values[0]).collect();
    // t = 0, 0.1 before the command; 0.2, 0.3 after.
    assert_eq!(values, vec![0.0, 0.0, 6.0, 6.0]);
    assert!((status[2].timestamp - 0.2).abs() < 1e-12);
}
