//! Vector message payload.

use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// A timestamped vector, encoded as JSON on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMessage {
    /// Simulation time at which the message was produced.
    pub timestamp: f64,
    pub values: Vec<f64>,
}

impl VectorMessage {
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    pub fn encode(&self) -> TransportResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> TransportResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_plain_json() {
        let msg = VectorMessage::new(0.5, vec![1.0, -2.0]);
        let bytes = msg.encode().unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text, r#"{"timestamp":0.5,"values":[1.0,-2.0]}"#);
        assert_eq!(VectorMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(VectorMessage::decode(b"not json").is_err());
    }
}
