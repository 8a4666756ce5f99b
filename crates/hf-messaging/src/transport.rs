//! Transport abstraction and an in-process implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TransportResult;

/// Moves byte payloads between named topics.
///
/// Implementations are shared between the simulation thread and whatever
/// produces incoming traffic, so they must be thread-safe.
pub trait MessageTransport: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()>;

    /// Register interest in a topic. Only the latest payload is kept.
    fn subscribe(&self, topic: &str) -> TransportResult<Mailbox>;
}

/// Latest payload delivered to a mailbox and its delivery number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Starts at 1 and increases with every delivery.
    pub sequence: u64,
    pub payload: Vec<u8>,
}

/// Latest-value slot shared between a transport and one subscriber.
///
/// Reading never consumes: a reader remembers the last sequence it adopted
/// and ignores deliveries that are not newer.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    slot: Arc<Mutex<Option<Delivery>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest payload and bump the sequence.
    pub fn deliver(&self, payload: Vec<u8>) {
        let mut slot = lock(&self.slot);
        let sequence = slot.as_ref().map_or(0, |d| d.sequence) + 1;
        *slot = Some(Delivery { sequence, payload });
    }

    /// Latest delivery, left in place.
    pub fn peek(&self) -> Option<Delivery> {
        lock(&self.slot).clone()
    }

    /// Sequence of the latest delivery; 0 before the first.
    pub fn sequence(&self) -> u64 {
        lock(&self.slot).as_ref().map_or(0, |d| d.sequence)
    }
}

/// Payloads kept per topic by `InMemoryTransport::new`.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Topic {
    subscribers: Vec<Mailbox>,
    log: VecDeque<Vec<u8>>,
    count: usize,
}

/// Thread-safe in-process transport.
///
/// Each topic keeps the most recent `log_capacity` payloads plus a total
/// publish count, so long runs use bounded memory.
#[derive(Debug)]
pub struct InMemoryTransport {
    topics: Mutex<HashMap<String, Topic>>,
    log_capacity: usize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` payloads per topic; 0 keeps none.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            log_capacity: capacity,
        }
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Retained payloads published on `topic`, oldest first.
    pub fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        lock(&self.topics)
            .get(topic)
            .map(|t| t.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent payload published on `topic`.
    pub fn last_published(&self, topic: &str) -> Option<Vec<u8>> {
        lock(&self.topics).get(topic).and_then(|t| t.log.back().cloned())
    }

    /// Total publishes on `topic`, including payloads dropped from the log.
    pub fn publish_count(&self, topic: &str) -> usize {
        lock(&self.topics).get(topic).map_or(0, |t| t.count)
    }
}

impl MessageTransport for InMemoryTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()> {
        let mut topics = lock(&self.topics);
        let entry = topics.entry(topic.to_string()).or_default();
        for mailbox in &entry.subscribers {
            mailbox.deliver(payload.clone());
        }
        entry.count += 1;
        if self.log_capacity > 0 {
            if entry.log.len() == self.log_capacity {
                entry.log.pop_front();
            }
            entry.log.push_back(payload);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> TransportResult<Mailbox> {
        let mailbox = Mailbox::new();
        lock(&self.topics)
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(mailbox.clone());
        Ok(mailbox)
    }
}

/// Poisoning is ignored: every critical section leaves its data consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
