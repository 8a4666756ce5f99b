//! hf-messaging: publish/subscribe at the edge of a diagram.
//!
//! Transports move opaque byte payloads between topics. Publisher and
//! subscriber leaf systems connect a diagram to a transport, touching it only
//! inside their own periodic events.

pub mod error;
pub mod message;
pub mod publisher;
pub mod subscriber;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use message::VectorMessage;
pub use publisher::VectorPublisher;
pub use subscriber::VectorSubscriber;
pub use transport::{DEFAULT_LOG_CAPACITY, Delivery, InMemoryTransport, Mailbox, MessageTransport};
