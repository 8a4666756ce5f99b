//! Publisher leaf: sends its input on a topic at a fixed period.

use std::sync::Arc;

use hf_core::HfResult;
use hf_framework::{
    EvalError, EvalResult, Event, InputPorts, LeafContext, LeafSystem, PeriodicEvent, PortSpec,
};
use tracing::trace;

use crate::message::VectorMessage;
use crate::transport::MessageTransport;

pub struct VectorPublisher {
    name: String,
    topic: String,
    transport: Arc<dyn MessageTransport>,
    event: PeriodicEvent,
    inputs: Vec<PortSpec>,
}

impl VectorPublisher {
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        transport: Arc<dyn MessageTransport>,
        width: usize,
        period: f64,
    ) -> HfResult<Self> {
        Ok(Self {
            name: name.into(),
            topic: topic.into(),
            transport,
            event: PeriodicEvent::publish(period)?,
            inputs: vec![PortSpec::vector("u", width)],
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl LeafSystem for VectorPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[PortSpec] {
        &self.inputs
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        vec![self.event]
    }

    fn publish(&self, ctx: &LeafContext<'_>, inputs: &InputPorts<'_>, _event: &Event) -> EvalResult<()> {
        let values = inputs.vector(0)?;
        let message = VectorMessage::new(ctx.time(), values.as_slice().to_vec());
        let payload = message
            .encode()
            .map_err(|e| EvalError::domain(&self.name, e.to_string()))?;
        trace!(topic = %self.topic, t = ctx.time(), "publish");
        self.transport
            .publish(&self.topic, payload)
            .map_err(|e| EvalError::domain(&self.name, e.to_string()))
    }
}
