//! Subscriber leaf: exposes the latest message received on a topic.
//!
//! Incoming payloads wait in a mailbox filled by the transport. The leaf
//! reads it only inside its own periodic discrete update, so received data
//! enters the context at event boundaries and never during integration.
//! Reading leaves the mailbox untouched; the context remembers which delivery
//! was adopted, so an update discarded by a fault can simply be recomputed.

use std::sync::Arc;

use hf_framework::{
    DiscreteUpdate, EvalError, EvalResult, Event, InputPorts, LeafContext, LeafSystem,
    PeriodicEvent, PortSpec, Value,
};
use nalgebra::DVector;
use tracing::trace;

use crate::error::{TransportError, TransportResult};
use crate::message::VectorMessage;
use crate::transport::{Mailbox, MessageTransport};

/// Discrete state: group 0 is the latest values, group 1 is
/// `[timestamp, sequence of the adopted delivery]`.
pub struct VectorSubscriber {
    name: String,
    topic: String,
    mailbox: Mailbox,
    initial: DVector<f64>,
    event: PeriodicEvent,
    outputs: Vec<PortSpec>,
}

impl VectorSubscriber {
    /// Subscribe to `topic`; until the first message the output is `initial`.
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        transport: Arc<dyn MessageTransport>,
        initial: &[f64],
        period: f64,
    ) -> TransportResult<Self> {
        let topic = topic.into();
        let name = name.into();
        let event = PeriodicEvent::discrete_update(period).map_err(|e| TransportError::Rejected {
            topic: topic.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            mailbox: transport.subscribe(&topic)?,
            name,
            topic,
            initial: DVector::from_column_slice(initial),
            event,
            outputs: vec![PortSpec::vector("y", initial.len())],
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn decode(&self, payload: &[u8]) -> TransportResult<VectorMessage> {
        let message = VectorMessage::decode(payload)?;
        if message.values.len() != self.initial.len() {
            return Err(TransportError::Width {
                topic: self.topic.clone(),
                expected: self.initial.len(),
                actual: message.values.len(),
            });
        }
        Ok(message)
    }
}

impl LeafSystem for VectorSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_ports(&self) -> &[PortSpec] {
        &self.outputs
    }

    fn default_discrete_state(&self) -> Vec<DVector<f64>> {
        vec![self.initial.clone(), DVector::zeros(2)]
    }

    fn periodic_events(&self) -> Vec<PeriodicEvent> {
        vec![self.event]
    }

    fn calc_output(&self, ctx: &LeafContext<'_>, _inputs: &InputPorts<'_>, _port: usize) -> EvalResult<Value> {
        Ok(Value::Vector(ctx.discrete_state(0)?.clone()))
    }

    fn calc_discrete_update(
        &self,
        ctx: &LeafContext<'_>,
        _inputs: &InputPorts<'_>,
        _event: &Event,
        update: &mut DiscreteUpdate,
    ) -> EvalResult<()> {
        let Some(delivery) = self.mailbox.peek() else {
            return Ok(());
        };
        let sequence = delivery.sequence as f64;
        if sequence <= ctx.discrete_state(1)?[1] {
            return Ok(());
        }
        let message = self
            .decode(&delivery.payload)
            .map_err(|e| EvalError::domain(&self.name, e.to_string()))?;
        trace!(topic = %self.topic, t = ctx.time(), sequence = delivery.sequence, "received");
        *update.group_mut(0)? = DVector::from_vec(message.values);
        *update.group_mut(1)? = DVector::from_vec(vec![message.timestamp, sequence]);
        Ok(())
    }
}
