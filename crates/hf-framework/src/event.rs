//! Periodic event declarations and the transient events generated from them.
//!
//! Trigger times are always computed as `offset + k * period` from an integer
//! `k`, never accumulated, so the same instant is reproduced bit for bit no
//! matter how many steps led up to it.

use hf_core::{HfError, HfResult};

/// What a triggered event does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Update discrete/abstract state. Dispatched before publishes.
    DiscreteUpdate,
    /// Observe state without changing it (e.g. send a message).
    Publish,
}

/// Why an event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    /// From a periodic declaration.
    Periodic,
    /// Simulator-wide publish after each committed step.
    PerStep,
}

/// Periodic event declared by a leaf system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicEvent {
    pub period: f64,
    pub offset: f64,
    pub kind: EventKind,
}

impl PeriodicEvent {
    pub fn new(period: f64, offset: f64, kind: EventKind) -> HfResult<Self> {
        if !period.is_finite() || period <= 0.0 {
            return Err(HfError::InvalidArg {
                what: "event period must be positive and finite",
            });
        }
        if !offset.is_finite() || offset < 0.0 {
            return Err(HfError::InvalidArg {
                what: "event offset must be non-negative and finite",
            });
        }
        Ok(Self {
            period,
            offset,
            kind,
        })
    }

    pub fn publish(period: f64) -> HfResult<Self> {
        Self::new(period, 0.0, EventKind::Publish)
    }

    pub fn discrete_update(period: f64) -> HfResult<Self> {
        Self::new(period, 0.0, EventKind::DiscreteUpdate)
    }

    /// The k-th trigger time.
    pub fn trigger_time(&self, k: u64) -> f64 {
        self.offset + k as f64 * self.period
    }

    /// Smallest trigger time strictly greater than `t`.
    pub fn next_trigger_after(&self, t: f64) -> f64 {
        self.trigger_time(self.first_index(t, false))
    }

    /// Smallest trigger time greater than or equal to `t`.
    pub fn first_trigger_at_or_after(&self, t: f64) -> f64 {
        self.trigger_time(self.first_index(t, true))
    }

    fn first_index(&self, t: f64, inclusive: bool) -> u64 {
        let passed = |k: u64| {
            let tk = self.trigger_time(k);
            if inclusive { tk < t } else { tk <= t }
        };
        let guess = ((t - self.offset) / self.period).floor();
        let mut k = if guess.is_finite() && guess > 0.0 {
            guess as u64
        } else {
            0
        };
        // The floating point guess can be off by one in either direction.
        while passed(k) {
            k += 1;
        }
        while k > 0 && !passed(k - 1) {
            k -= 1;
        }
        k
    }
}

/// Periodic event bound to the context record of the leaf that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDeclaration {
    /// Pre-order context record of the owning leaf.
    pub owner: usize,
    /// Owning leaf's name, for diagnostics.
    pub system: String,
    /// Position in the owner's `periodic_events()` list.
    pub ordinal: usize,
    pub event: PeriodicEvent,
}

/// A concrete event occurrence, generated by the simulator's schedule scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub trigger_time: f64,
    pub kind: EventKind,
    pub trigger: TriggerType,
    /// Pre-order context record of the owning leaf.
    pub owner: usize,
}

impl Event {
    pub fn periodic(decl: &EventDeclaration, trigger_time: f64) -> Self {
        Self {
            trigger_time,
            kind: decl.event.kind,
            trigger: TriggerType::Periodic,
            owner: decl.owner,
        }
    }

    pub fn per_step_publish(owner: usize, trigger_time: f64) -> Self {
        Self {
            trigger_time,
            kind: EventKind::Publish,
            trigger: TriggerType::PerStep,
            owner,
        }
    }
}
